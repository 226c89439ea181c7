// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use etw_provider as etw;

const INITIALIZED: etw::EventDescriptor =
    etw::EventDescriptor::new(101, etw::Level::Informational);
const START_SORT: etw::EventDescriptor =
    etw::EventDescriptor::new(102, etw::Level::Informational).with_opcode(etw::Opcode::Start);
const STOP_SORT: etw::EventDescriptor =
    etw::EventDescriptor::new(103, etw::Level::Informational).with_opcode(etw::Opcode::Stop);
const FINISHED: etw::EventDescriptor = etw::EventDescriptor::new(104, etw::Level::Informational);

fn main() {
    let provider = etw::Provider::new(
        etw::Guid::from_name("SortSample"),
        "SortSample",
        &etw::Provider::new_options(),
    );
    println!(
        "{} {} status={:?} implementation={:?}",
        provider.name(),
        provider.id(),
        provider.status(),
        etw::NATIVE_IMPLEMENTATION
    );

    let mut values: Vec<i32> = (0..1000).rev().collect();

    let err = etw::write_event!(provider, INITIALIZED, "Initialized");
    println!("Initialized: {}", err);

    let err = etw::write_event!(
        provider,
        START_SORT,
        "StartSort",
        int32("element_count", values.len() as i32)
    );
    println!("StartSort: {}", err);

    values.sort_unstable();

    let err = etw::write_event!(provider, STOP_SORT, "StopSort");
    println!("StopSort: {}", err);

    let err = etw::write_event!(
        provider,
        FINISHED,
        "Finished",
        ansi_str("result", c"sorted"),
        int32("first", values[0]),
        pointer("buffer", values.as_ptr())
    );
    println!("Finished: {}", err);
}
