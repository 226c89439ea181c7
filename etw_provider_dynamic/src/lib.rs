// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![no_std]
#![warn(missing_docs)]
#![allow(clippy::needless_return)]

//! # Runtime-specified manifest-free ETW events
//!
//! `etw_provider_dynamic` provides a flexible way to write manifest-free ETW events
//! whose names and fields are only known at runtime, e.g. events forwarded from
//! another logging system or defined by configuration.
//!
//! For events known at compile time, prefer the `write_event!` macro from
//! `etw_provider`, which builds metadata at compile time and does not allocate.
//!
//! # Overview
//!
//! - Create a [Provider] object with the id and name of the provider to be used.
//! - Use [Provider::enabled] to determine whether anybody is listening for an event
//!   with a given level and keyword.
//! - If so, use an [EventBuilder] to build the event (setting descriptor values and
//!   adding fields) then write the event through the provider.
//! - The provider will automatically unregister when it is dropped. You can manually
//!   call [Provider::unregister] if you want to unregister sooner.
//!
//! # Example
//!
//! ```
//! use etw_provider_dynamic as etwd;
//!
//! let provider = etwd::Provider::new(
//!     etwd::Guid::from_name("MyCompany.MyComponent"),
//!     "MyCompany.MyComponent",
//!     &etwd::Provider::new_options(),
//! );
//!
//! // It is more efficient to only build and write the event if it is enabled.
//! if provider.enabled(etwd::Level::Verbose, 0x1) {
//!     etwd::EventBuilder::new()
//!         .reset("MyEventName", etwd::Level::Verbose)
//!         .keyword(0x1)
//!         .add_str8("FieldName1", "FieldValue")
//!         .add_value("FieldName2", 42u32)
//!         .add_value_as("FieldName3", 0xbeefu32, etwd::InType::HexInt32)
//!         .write(&provider);
//! }
//! ```
//!
//! # Notes
//!
//! The [EventBuilder] object is reusable. You may get a small performance benefit by
//! reusing an EventBuilder object for multiple events rather than using a new
//! EventBuilder for each event.
//!
//! Each event is written with the same descriptor layout as a compile-time event:
//! provider traits, event metadata, then the payload as one block.

// Re-exports from etw_provider:
pub use etw_provider::EtwApi;
pub use etw_provider::EventDescriptor;
pub use etw_provider::Guid;
pub use etw_provider::InType;
pub use etw_provider::Level;
pub use etw_provider::NativeImplementation;
pub use etw_provider::Opcode;
pub use etw_provider::Provider;
pub use etw_provider::ProviderOptions;
pub use etw_provider::ProviderStatus;
pub use etw_provider::WStr;
pub use etw_provider::NATIVE_IMPLEMENTATION;

// Exports from etw_provider_dynamic:
pub use builder::EventBuilder;

extern crate alloc;
mod builder;
