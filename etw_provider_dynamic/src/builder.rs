// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use alloc::vec::Vec;
use core::mem::size_of;

use etw_provider::EtwApi;
use etw_provider::EventDescriptor;
use etw_provider::FieldData;
use etw_provider::Guid;
use etw_provider::InType;
use etw_provider::Level;
use etw_provider::Opcode;
use etw_provider::Provider;
use etw_provider::ValueField;
use etw_provider::WStr;
use etw_provider::_internal::EventDataDescriptor;
use etw_provider::_internal::ERROR_ARITHMETIC_OVERFLOW;
use etw_provider::_internal::EVENT_METADATA_HEADER_LEN;
use etw_provider::_internal::METADATA_SIZE_MAX;

/// `EventBuilder` is a builder for events whose name and fields are only known at
/// runtime.
///
/// # Overview
///
/// - Check [`Provider::enabled`] and only perform the remaining steps if it
///   returns true. This avoids building events that nobody is listening for.
/// - Get an EventBuilder, e.g. `let mut builder = EventBuilder::new();`.
///   - EventBuilder is reusable. Reusing a builder avoids reallocating its
///     buffers for each event.
/// - Call `builder.reset("EventName", level)` to begin building an event.
///   - The event name should be short and distinct. Don't use the same name for two
///     events in the same provider that have different fields.
/// - For each field, call one of the `add` methods:
///   - [`EventBuilder::add_value`] adds a fixed-width value. The in-type comes from the
///     Rust type, e.g. `i32` is `Int32` and `usize` is `Pointer`.
///   - [`EventBuilder::add_value_as`] adds a fixed-width value with an explicit
///     in-type, e.g. a `u32` written as `HexInt32`.
///   - [`EventBuilder::add_str8`] and [`EventBuilder::add_str16`] add narrow and wide
///     strings.
/// - If appropriate, set other descriptor values with [`EventBuilder::id`],
///   [`EventBuilder::keyword`], [`EventBuilder::opcode`] or [`EventBuilder::task`].
/// - Call `builder.write(&provider)` or `builder.write_transfer(...)` to send the
///   event.
///
/// # Event Size Limits
///
/// The metadata blob has a 16-bit size prefix, so the metadata is limited to 65535
/// bytes. The payload is limited to 65535 bytes as well. Writes of events over
/// either limit return `ERROR_ARITHMETIC_OVERFLOW` without calling ETW.
#[derive(Debug)]
pub struct EventBuilder {
    meta: Vec<u8>,
    data: Vec<u8>,
    descriptor: EventDescriptor,
}

impl EventBuilder {
    /// Returns a new event builder with default initial buffer capacity.
    ///
    /// Default capacity is currently 256 bytes for meta and 256 bytes for data.
    /// Buffers will automatically grow as needed.
    pub fn new() -> EventBuilder {
        return Self::new_with_capacity(256, 256);
    }

    /// Returns a new event builder with specified initial buffer capacities.
    /// Buffers will automatically grow as needed.
    pub fn new_with_capacity(meta_capacity: u16, data_capacity: u16) -> EventBuilder {
        let mut b = EventBuilder {
            meta: Vec::with_capacity(if (meta_capacity as usize) < EVENT_METADATA_HEADER_LEN + 1 {
                EVENT_METADATA_HEADER_LEN + 1
            } else {
                meta_capacity as usize
            }),
            data: Vec::with_capacity(data_capacity as usize),
            descriptor: EventDescriptor::new(0, Level::Verbose),
        };
        b.reset("", Level::Verbose);
        return b;
    }

    /// Clears the previous event (if any) from the builder and starts building a new
    /// event.
    ///
    /// - `name` is the event name. It should be short and unique. It must not contain any
    ///   `'\0'` bytes.
    ///
    /// - `level` is the event severity. Id, keyword, opcode and task are reset to 0.
    pub fn reset(&mut self, name: &str, level: Level) -> &mut Self {
        debug_assert!(!name.contains('\0'), "event name must not contain '\\0'");

        self.meta.clear();
        self.data.clear();
        self.descriptor = EventDescriptor::new(0, level);

        self.meta.extend_from_slice(&[0, 0, 0]); // size (filled in by finish_meta), tag
        self.meta.extend_from_slice(name.as_bytes());
        self.meta.push(0); // nul termination

        return self;
    }

    /// Sends the finished event through `provider` with no activity id.
    ///
    /// Returns 0 if the event was written or skipped (provider not registered or not
    /// enabled for the event's level and keyword). Returns `ERROR_ARITHMETIC_OVERFLOW`
    /// if the metadata or payload exceeds 65535 bytes. Otherwise returns the status of
    /// the native write. The return value is for diagnostic purposes only and should
    /// generally be ignored in retail builds.
    pub fn write<A: EtwApi>(&mut self, provider: &Provider<A>) -> u32 {
        return self.write_transfer(provider, None, None);
    }

    /// Sends the finished event through `provider`.
    ///
    /// - `activity_id` contains the activity id to be assigned to the event. Use `None` if
    ///   the event is not part of an activity.
    ///
    /// - `related_id` contains the related (parent) activity id, normally only for an
    ///   event with [`Opcode::Start`]. If `activity_id` is `None`, this must also be
    ///   `None`.
    ///
    /// Return value is the same as for [`EventBuilder::write`].
    pub fn write_transfer<A: EtwApi>(
        &mut self,
        provider: &Provider<A>,
        activity_id: Option<&Guid>,
        related_id: Option<&Guid>,
    ) -> u32 {
        debug_assert!(related_id.is_none() || activity_id.is_some());
        self.finish_meta();
        if self.meta.len() > METADATA_SIZE_MAX || self.data.len() > METADATA_SIZE_MAX {
            return ERROR_ARITHMETIC_OVERFLOW;
        }

        let mut data = [
            EventDataDescriptor::zero(),
            EventDataDescriptor::zero(),
            EventDataDescriptor::from_bytes(&self.data),
        ];
        let count = if self.data.is_empty() { 2 } else { 3 };
        return provider.write_transfer(
            &self.descriptor,
            activity_id,
            related_id,
            &self.meta,
            &mut data[..count],
        );
    }

    /// Returns the metadata blob of the event built so far, with its size prefix
    /// filled in.
    pub fn metadata(&mut self) -> &[u8] {
        self.finish_meta();
        return &self.meta;
    }

    /// Returns the payload bytes of the event built so far.
    pub fn payload(&self) -> &[u8] {
        return &self.data;
    }

    /// Returns the descriptor that will be used for the event.
    pub fn descriptor(&self) -> &EventDescriptor {
        return &self.descriptor;
    }

    /// Sets the event id. Default is 0.
    ///
    /// Manifest-free events are identified by name, so most events do not need an id.
    pub fn id(&mut self, id: u16) -> &mut Self {
        self.descriptor.id = id;
        return self;
    }

    /// Sets the event level.
    pub fn level(&mut self, level: Level) -> &mut Self {
        self.descriptor.level = level;
        return self;
    }

    /// Sets the event keyword (category bits). Default is 0, meaning the event is
    /// not filtered by keyword.
    pub fn keyword(&mut self, keyword: u64) -> &mut Self {
        self.descriptor.keyword = keyword;
        return self;
    }

    /// Sets the opcode of the event. Default opcode is [`Opcode::Info`] (0).
    ///
    /// Use [`Opcode::Start`] and [`Opcode::Stop`] with
    /// [`EventBuilder::write_transfer`] to mark the bounds of an activity.
    pub fn opcode(&mut self, opcode: Opcode) -> &mut Self {
        self.descriptor.opcode = opcode;
        return self;
    }

    /// Sets the event task. Default is 0.
    pub fn task(&mut self, task: u16) -> &mut Self {
        self.descriptor.task = task;
        return self;
    }

    /// Adds a field containing a fixed-width value. The in-type is determined by
    /// the value's type:
    ///
    /// | Type | In-type |
    /// |------|---------|
    /// | `i8`, `u8` | Int8, UInt8 |
    /// | `i16`, `u16` | Int16, UInt16 |
    /// | `i32`, `u32` | Int32, UInt32 |
    /// | `i64`, `u64` | Int64, UInt64 |
    /// | `f32`, `f64` | Float, Double |
    /// | `usize`, `*const T`, `*mut T` | Pointer |
    ///
    /// - `field_name` should be a short and distinct string that describes the field.
    ///   It must not contain any `'\0'` bytes.
    pub fn add_value<V: ValueField>(&mut self, field_name: &str, field_value: V) -> &mut Self {
        return self
            .raw_add_meta(field_name, V::IN_TYPE)
            .raw_add_data_value(&field_value);
    }

    /// Adds a field containing a fixed-width value recorded with the specified
    /// in-type, e.g. a `u32` recorded as [`InType::HexInt32`] or an `i32` recorded
    /// as [`InType::Bool32`].
    ///
    /// `in_type` must be a fixed-width type whose size is `size_of::<V>()`. This is
    /// checked in debug builds.
    pub fn add_value_as<V: ValueField>(
        &mut self,
        field_name: &str,
        field_value: V,
        in_type: InType,
    ) -> &mut Self {
        debug_assert_eq!(
            in_type.fixed_size(),
            Some(size_of::<V>()),
            "in_type does not match the size of the value"
        );
        return self
            .raw_add_meta(field_name, in_type)
            .raw_add_data_value(&field_value);
    }

    /// Adds a `Bool32` field.
    pub fn add_bool32(&mut self, field_name: &str, field_value: bool) -> &mut Self {
        return self.add_value_as(field_name, field_value as i32, InType::Bool32);
    }

    /// Adds an `AnsiString` field. The value is written as its bytes followed by a
    /// `'\0'`. If the value contains a `'\0'`, it is truncated at the first `'\0'`.
    pub fn add_str8(&mut self, field_name: &str, field_value: &str) -> &mut Self {
        let bytes = field_value.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.raw_add_meta(field_name, InType::AnsiString);
        self.data.extend_from_slice(&bytes[..end]);
        self.data.push(0);
        return self;
    }

    /// Adds a `UnicodeString` field. The value is written as UTF-16 code units
    /// followed by a 16-bit `'\0'`. If the value contains a `'\0'`, it is truncated
    /// at the first `'\0'`.
    pub fn add_str16(&mut self, field_name: &str, field_value: &str) -> &mut Self {
        self.raw_add_meta(field_name, InType::UnicodeString);
        for unit in field_value.encode_utf16().take_while(|&u| u != 0) {
            self.data.extend_from_slice(&unit.to_ne_bytes());
        }
        self.data.extend_from_slice(&0u16.to_ne_bytes());
        return self;
    }

    /// Adds a `UnicodeString` field from an existing NUL-terminated UTF-16 string.
    pub fn add_wstr(&mut self, field_name: &str, field_value: WStr<'_>) -> &mut Self {
        self.raw_add_meta(field_name, InType::UnicodeString);
        for unit in field_value.as_slice_with_nul() {
            self.data.extend_from_slice(&unit.to_ne_bytes());
        }
        return self;
    }

    /// *Advanced scenarios:* Directly adds a field declaration to the metadata
    /// without adding any data. The caller must add data that matches `in_type`
    /// using the raw_add_data methods, or the event will not decode correctly.
    pub fn raw_add_meta(&mut self, field_name: &str, in_type: InType) -> &mut Self {
        debug_assert!(
            !field_name.contains('\0'),
            "field_name must not contain '\\0'"
        );

        self.meta.reserve(field_name.len() + 2);
        self.meta.extend_from_slice(field_name.as_bytes());
        self.meta.push(0); // nul termination
        self.meta.push(in_type.as_int());

        return self;
    }

    /// *Advanced scenarios:* Directly adds the bytes of a value to the payload
    /// without adding any metadata.
    pub fn raw_add_data_value<V: ValueField>(&mut self, value: &V) -> &mut Self {
        if let FieldData::Value(bytes) = FieldData::value(value) {
            self.data.extend_from_slice(bytes);
        }
        return self;
    }

    /// *Advanced scenarios:* Directly adds bytes to the payload without adding any
    /// metadata.
    pub fn raw_add_data_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.data.extend_from_slice(value);
        return self;
    }

    /// Fills in the size prefix once the blob is complete. Saturates; oversized
    /// events are rejected by write.
    fn finish_meta(&mut self) {
        let size = if self.meta.len() > METADATA_SIZE_MAX {
            u16::MAX
        } else {
            self.meta.len() as u16
        };
        self.meta[0..2].copy_from_slice(&size.to_le_bytes());
    }
}

impl Default for EventBuilder {
    fn default() -> Self {
        return Self::new();
    }
}
