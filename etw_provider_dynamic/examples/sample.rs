// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use etw_provider_dynamic as etwd;

fn main() {
    let provider = etwd::Provider::new(
        etwd::Guid::from_name("EtwDynamicSample"),
        "EtwDynamicSample",
        etwd::Provider::new_options().group_id(etwd::Guid::from_name("SampleGroup")),
    );
    println!(
        "{} {} status={:?} implementation={:?}",
        provider.name(),
        provider.id(),
        provider.status(),
        etwd::NATIVE_IMPLEMENTATION
    );

    let mut builder = etwd::EventBuilder::new();

    let err = builder
        .reset("Startup", etwd::Level::Informational)
        .add_str8("host", "sample")
        .add_str16("user", "someone")
        .add_value("pid", std::process::id())
        .write(&provider);
    println!("Startup: {}", err);

    let activity = etwd::Guid::from_u128(&0x7ae27afb_11cf_4edd_8b15_9997ec20e0fc);
    for (name, opcode) in [("Work", etwd::Opcode::Start), ("Work", etwd::Opcode::Stop)] {
        let err = builder
            .reset(name, etwd::Level::Verbose)
            .keyword(0x1)
            .opcode(opcode)
            .add_value_as("flags", 0x11u32, etwd::InType::HexInt32)
            .add_bool32("ok", true)
            .write_transfer(&provider, Some(&activity), None);
        println!("{} {:?}: {}", name, opcode, err);
    }
}
