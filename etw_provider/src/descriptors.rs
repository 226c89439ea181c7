// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::marker::PhantomData;
use core::mem::size_of;

use crate::enums::DataKind;
use crate::enums::Level;
use crate::enums::Opcode;

/// Characteristics of an ETW event: severity level, id, keyword, etc.
///
/// This has the same layout as the native `EVENT_DESCRIPTOR` structure. For a
/// particular event definition the descriptor should be constant. Define it once
/// as a `const` or `static` and share it with every write of that event:
///
/// ```
/// # use etw_provider::*;
/// const START_SORT: EventDescriptor = EventDescriptor::new(102, Level::Informational)
///     .with_opcode(Opcode::Start);
/// assert_eq!(START_SORT.channel, EventDescriptor::MANIFEST_FREE_CHANNEL);
/// assert_eq!(START_SORT.keyword, 0);
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventDescriptor {
    /// Event id. Manifest-free events are identified by name, so the id is
    /// informational. Use 0 if the event has no assigned id.
    pub id: u16,

    /// Event version. Always 0 for manifest-free events.
    pub version: u8,

    /// Event channel. Always [`EventDescriptor::MANIFEST_FREE_CHANNEL`].
    pub channel: u8,

    /// Event severity level: 1=critical, 2=error, 3=warning, 4=info, 5=verbose.
    pub level: Level,

    /// Special semantics for event: 0=informational, 1=activity-start, 2=activity-stop.
    pub opcode: Opcode,

    /// Provider-defined task value, 0 if unused.
    pub task: u16,

    /// Category bits. 0 means the event is not filtered by keyword.
    pub keyword: u64,
}

impl EventDescriptor {
    /// Channel value that marks an event as carrying self-describing metadata.
    pub const MANIFEST_FREE_CHANNEL: u8 = 11;

    /// Creates a descriptor with the specified id and level. Keyword, opcode and
    /// task are 0.
    pub const fn new(id: u16, level: Level) -> Self {
        return Self::from_parts(id, level, 0, Opcode::Info, 0);
    }

    /// Creates a descriptor from values. Version is 0 and channel is
    /// [`EventDescriptor::MANIFEST_FREE_CHANNEL`].
    pub const fn from_parts(id: u16, level: Level, keyword: u64, opcode: Opcode, task: u16) -> Self {
        return Self {
            id,
            version: 0,
            channel: Self::MANIFEST_FREE_CHANNEL,
            level,
            opcode,
            task,
            keyword,
        };
    }

    /// Returns a copy of this descriptor with the specified keyword.
    pub const fn with_keyword(mut self, keyword: u64) -> Self {
        self.keyword = keyword;
        return self;
    }

    /// Returns a copy of this descriptor with the specified opcode.
    pub const fn with_opcode(mut self, opcode: Opcode) -> Self {
        self.opcode = opcode;
        return self;
    }

    /// Returns a copy of this descriptor with the specified task.
    pub const fn with_task(mut self, task: u16) -> Self {
        self.task = task;
        return self;
    }
}

/// Describes a block of data to be sent to ETW.
///
/// Note: This must have the same underlying representation as the native
/// `EVENT_DATA_DESCRIPTOR` structure.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct EventDataDescriptor<'a> {
    ptr: u64,
    size: u32,
    kind: DataKind,
    reserved1: u8,
    reserved2: u16,
    lifetime: PhantomData<&'a [u8]>,
}

impl<'a> EventDataDescriptor<'a> {
    /// Returns an EventDataDescriptor initialized with { null, 0, Payload }.
    pub const fn zero() -> Self {
        return Self {
            ptr: 0,
            size: 0,
            kind: DataKind::Payload,
            reserved1: 0,
            reserved2: 0,
            lifetime: PhantomData,
        };
    }

    /// Returns true if this descriptor's size is 0.
    pub const fn is_empty(&self) -> bool {
        return self.size == 0;
    }

    /// Address of the referenced bytes.
    pub const fn ptr(&self) -> u64 {
        return self.ptr;
    }

    /// Number of referenced bytes.
    pub const fn size(&self) -> u32 {
        return self.size;
    }

    /// Role of the referenced bytes.
    pub const fn kind(&self) -> DataKind {
        return self.kind;
    }

    /// Returns an EventDataDescriptor initialized with the specified slice's bytes.
    /// Sizes beyond `u32::MAX` are truncated; ETW rejects such events anyway.
    pub fn from_bytes(value: &'a [u8]) -> Self {
        return Self::from_parts(value.as_ptr() as usize, value.len(), DataKind::Payload);
    }

    /// Returns an EventDataDescriptor initialized with the specified value's bytes.
    pub fn from_value<T: Copy>(value: &'a T) -> Self {
        return Self::from_parts(value as *const T as usize, size_of::<T>(), DataKind::Payload);
    }

    /// Returns an EventDataDescriptor for the specified slice's elements.
    pub fn from_slice<T: Copy>(value: &'a [T]) -> Self {
        return Self::from_parts(
            value.as_ptr() as usize,
            size_of::<T>() * value.len(),
            DataKind::Payload,
        );
    }

    /// Returns an EventDataDescriptor referencing an event metadata blob.
    pub fn from_event_metadata(metadata: &'a [u8]) -> Self {
        return Self::from_parts(
            metadata.as_ptr() as usize,
            metadata.len(),
            DataKind::EventMetadata,
        );
    }

    /// Returns an EventDataDescriptor referencing a provider traits blob.
    pub fn from_provider_traits(traits: &'a [u8]) -> Self {
        return Self::from_parts(
            traits.as_ptr() as usize,
            traits.len(),
            DataKind::ProviderMetadata,
        );
    }

    fn from_parts(ptr: usize, size: usize, kind: DataKind) -> Self {
        return Self {
            ptr: ptr as u64,
            size: size as u32,
            kind,
            reserved1: 0,
            reserved2: 0,
            lifetime: PhantomData,
        };
    }
}
