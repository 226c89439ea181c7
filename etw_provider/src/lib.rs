// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![no_std]
#![allow(clippy::needless_return)]
#![warn(missing_docs)]

//! # Manifest-free ETW events
//!
//! `etw_provider` writes self-describing (manifest-free) events to Event Tracing
//! for Windows. Every event carries its own metadata blob (event name, field names
//! and field types), so no manifest needs to be registered for a decoder to read
//! the event.
//!
//! ## Event layout
//!
//! Each write hands ETW a descriptor array:
//!
//! - `data[0]`: the provider traits blob, `u16 size ++ provider_name ++ '\0'`,
//!   optionally followed by a provider-group trait.
//! - `data[1]`: the event metadata blob,
//!   `u16 size ++ u8 0 ++ event_name ++ '\0' ++ Σ(field_name ++ '\0' ++ u8 in_type)`.
//! - `data[2..]`: one descriptor per field value, in declaration order. Fixed-width
//!   values use `size_of` bytes, narrow strings `len + 1` bytes and wide strings
//!   `2 * len + 2` bytes. Values are referenced in place, never copied.
//!
//! The metadata blob for an event is built by a `const fn` and stored in a
//! `static`, so building it costs nothing at runtime.
//!
//! ## Enablement
//!
//! Sessions enable a provider with a level and a keyword mask. An event is
//! recorded when the provider is enabled, the event's level is `<=` the session
//! level, and the event keyword is 0 or shares a bit with the session mask. The
//! check is a few relaxed atomic loads, short-circuiting when disabled.
//! [`write_event!`] performs the check before evaluating any field argument.
//!
//! ## Failure policy
//!
//! Tracing never affects the host program: a provider that fails to register
//! becomes a permanent no-op sink, and write failures are ignored. Status codes
//! are returned for diagnostics only.
//!
//! ## Example
//!
//! ```
//! use etw_provider as etw;
//!
//! const START_SORT: etw::EventDescriptor =
//!     etw::EventDescriptor::new(102, etw::Level::Informational).with_opcode(etw::Opcode::Start);
//!
//! let provider = etw::Provider::new(
//!     etw::Guid::from_name("example"),
//!     "example",
//!     &etw::Provider::new_options(),
//! );
//!
//! let element_count = 1000i32;
//! etw::write_event!(provider, START_SORT, "StartSort", int32("element_count", element_count));
//! ```

extern crate alloc;

pub use descriptors::EventDataDescriptor;
pub use descriptors::EventDescriptor;
pub use enums::DataKind;
pub use enums::InType;
pub use enums::Level;
pub use enums::Opcode;
pub use fields::FieldData;
pub use fields::PointerField;
pub use fields::ValueField;
pub use fields::WStr;
pub use guid::Guid;
pub use metadata::event_metadata_len;
pub use metadata::provider_traits;
pub use metadata::provider_traits_name;
pub use metadata::EventMetadata;
pub use metadata::EventMetadataView;
pub use metadata::FieldSpec;
pub use metadata::FieldSpecs;
pub use metadata::MetadataError;
pub use native::CallbackFilterData;
pub use native::CallbackSourceId;
pub use native::EnableCallback;
pub use native::EtwApi;
pub use native::NativeEtw;
pub use native::NativeImplementation;
pub use native::NATIVE_IMPLEMENTATION;
pub use provider::Provider;
pub use provider::ProviderOptions;
pub use provider::ProviderState;
pub use provider::ProviderStatus;
pub mod _internal;

/// Builds the metadata blob for an event at compile time and returns it as a
/// `&'static [u8]`.
///
/// Fields are given either by kind, using the same kind names as
/// [`write_event!`], or by explicit [`InType`]:
///
/// ```
/// # use etw_provider::*;
/// let by_kind = event_metadata!("StartSort", int32("element_count"));
/// let by_type = event_metadata!("StartSort", "element_count" => InType::Int32);
/// assert_eq!(by_kind, by_type);
/// assert_eq!(by_kind[0] as usize, by_kind.len());
///
/// let no_fields = event_metadata!("Initialized");
/// assert_eq!(no_fields, b"\x0f\x00\x00Initialized\x00");
/// ```
///
/// Names must be constant expressions and must not contain `'\0'`; violations are
/// compile errors.
#[macro_export]
macro_rules! event_metadata {
    (@encode $name:expr, $($field:expr),*) => {{
        const _ETW_FIELDS: &[$crate::_internal::FieldSpec<'static>] = &[$($field),*];
        static _ETW_METADATA: $crate::_internal::EventMetadata<
            { $crate::_internal::event_metadata_len($name, _ETW_FIELDS) },
        > = $crate::_internal::EventMetadata::new($name, _ETW_FIELDS);
        _ETW_METADATA.as_bytes()
    }};
    ($name:expr $(, $kind:ident($field_name:expr))* $(,)?) => {
        $crate::event_metadata!(@encode $name,
            $($crate::_internal::FieldSpec::new($field_name, $crate::_internal::fields::$kind::IN_TYPE)),*)
    };
    ($name:expr $(, $field_name:expr => $in_type:expr)* $(,)?) => {
        $crate::event_metadata!(@encode $name,
            $($crate::_internal::FieldSpec::new($field_name, $in_type)),*)
    };
}

/// Writes an event if the provider is enabled for the event's level and keyword.
///
/// `write_event!(PROVIDER, DESCRIPTOR, "EventName", KIND("field_name", value), ...)`
///
/// - `PROVIDER` is a [`Provider`] (or a reference or smart pointer to one).
/// - `DESCRIPTOR` is the event's [`EventDescriptor`].
/// - `"EventName"` is a constant string naming the event.
/// - Each field is `KIND("field_name", value)` where `KIND` selects the in-type and
///   the Rust type accepted for `value`:
///
/// | Kind | Value type | In-type |
/// |------|------------|---------|
/// | `ansi_str` | `&CStr` | AnsiString |
/// | `unicode_str` | [`WStr`] | UnicodeString |
/// | `int8`, `uint8` | `i8`, `u8` | Int8, UInt8 |
/// | `int16`, `uint16` | `i16`, `u16` | Int16, UInt16 |
/// | `int32`, `uint32` | `i32`, `u32` | Int32, UInt32 |
/// | `int64`, `uint64` | `i64`, `u64` | Int64, UInt64 |
/// | `float`, `double` | `f32`, `f64` | Float, Double |
/// | `bool32` | `i32` | Bool32 |
/// | `hex_int32`, `hex_int64` | `u32`, `u64` | HexInt32, HexInt64 |
/// | `pointer` | `usize`, `*const T`, `*mut T` | Pointer |
///
/// The metadata blob is generated at compile time from the same field list, so a
/// field's in-type always matches how its value is marshalled. Field values are
/// evaluated only if the event is enabled, and are referenced, not copied.
///
/// Evaluates to the `u32` status of the write (0 if the event was skipped). The
/// status is for diagnostics only.
#[macro_export]
macro_rules! write_event {
    ($provider:expr, $descriptor:expr, $name:expr $(, $kind:ident($field_name:expr, $value:expr))* $(,)?) => {{
        let _etw_provider = &$provider;
        let _etw_descriptor: &$crate::EventDescriptor = &$descriptor;
        if !_etw_provider.enabled_for(_etw_descriptor) {
            0u32
        } else {
            _etw_provider.write_descriptors(
                _etw_descriptor,
                $crate::event_metadata!($name $(, $kind($field_name))*),
                &mut [
                    $crate::_internal::EventDataDescriptor::zero(),
                    $crate::_internal::EventDataDescriptor::zero(),
                    $($crate::_internal::fields::$kind::data(&$value).descriptor(),)*
                ],
            )
        }
    }};
}

mod descriptors;
mod enums;
mod fields;
mod guid;
mod metadata;
mod native;
mod provider;
