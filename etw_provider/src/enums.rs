// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![allow(non_upper_case_globals)]

use core::fmt;
use core::mem::size_of;

#[allow(unused_imports)]
use crate::descriptors::EventDataDescriptor; // For docs
#[allow(unused_imports)]
use crate::descriptors::EventDescriptor; // For docs

/// Indicates the severity of an event. Use Verbose if unsure.
///
/// Lower values are more severe. A session listening at level `L` receives events
/// whose level is `<= L`.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Level(u8);

impl Level {
    /// Returns a Level with the specified value.
    pub const fn from_int(value: u8) -> Level {
        return Level(value);
    }

    /// Returns the numeric value corresponding to this Level value.
    pub const fn as_int(self) -> u8 {
        return self.0;
    }

    /// Event always passes the level filter (`WINEVENT_LEVEL_LOG_ALWAYS`).
    pub const None: Level = Level(0);

    /// Critical error.
    pub const CriticalError: Level = Level(1);

    /// Error.
    pub const Error: Level = Level(2);

    /// Warning.
    pub const Warning: Level = Level(3);

    /// Informational.
    pub const Informational: Level = Level(4);

    /// Verbose.
    pub const Verbose: Level = Level(5);
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return self.0.fmt(f);
    }
}

impl From<u8> for Level {
    fn from(val: u8) -> Self {
        return Self(val);
    }
}

impl From<Level> for u8 {
    fn from(val: Level) -> Self {
        return val.0;
    }
}

/// Special semantics for an event: informational, activity start, activity stop.
///
/// Values follow the standard `winmeta.xml` opcode assignments.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Opcode(u8);

impl Opcode {
    /// Returns an Opcode with the specified value.
    pub const fn from_int(value: u8) -> Opcode {
        return Opcode(value);
    }

    /// Returns the numeric value corresponding to this Opcode value.
    pub const fn as_int(self) -> u8 {
        return self.0;
    }

    /// Normal event. The event may be part of an activity if an activity id
    /// is supplied with the write.
    pub const Info: Opcode = Opcode(0);

    /// Event indicates the beginning of an activity.
    pub const Start: Opcode = Opcode(1);

    /// Event indicates the end of an activity.
    pub const Stop: Opcode = Opcode(2);

    /// Data collection starting.
    pub const DataCollectionStart: Opcode = Opcode(3);

    /// Data collection ending.
    pub const DataCollectionStop: Opcode = Opcode(4);

    /// Extension event.
    pub const Extension: Opcode = Opcode(5);

    /// Reply to a request.
    pub const Reply: Opcode = Opcode(6);

    /// Resuming after a suspension.
    pub const Resume: Opcode = Opcode(7);

    /// Suspending; a Resume event is expected later.
    pub const Suspend: Opcode = Opcode(8);

    /// Message sent to another component.
    pub const Send: Opcode = Opcode(9);

    /// Message received from another component.
    pub const Receive: Opcode = Opcode(240);
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return self.0.fmt(f);
    }
}

impl From<u8> for Opcode {
    fn from(val: u8) -> Self {
        return Self(val);
    }
}

impl From<Opcode> for u8 {
    fn from(val: Opcode) -> Self {
        return val.0;
    }
}

/// Type tag stored after each field name in event metadata.
///
/// The in-type tells the decoder how many payload bytes belong to the field and
/// how to interpret them. The numeric values are part of the wire format.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InType(u8);

impl InType {
    /// Returns an InType with the specified value.
    pub const fn from_int(value: u8) -> InType {
        return InType(value);
    }

    /// Returns the numeric value corresponding to this InType value.
    pub const fn as_int(self) -> u8 {
        return self.0;
    }

    /// Invalid type. Never appears in well-formed metadata.
    pub const Null: InType = InType(0);

    /// Nul-terminated UTF-16LE string.
    pub const UnicodeString: InType = InType(1);

    /// Nul-terminated 8-bit string (code page unspecified, usually UTF-8 or CP-1252).
    pub const AnsiString: InType = InType(2);

    /// 8-bit signed integer.
    pub const Int8: InType = InType(3);

    /// 8-bit unsigned integer.
    pub const UInt8: InType = InType(4);

    /// 16-bit signed integer.
    pub const Int16: InType = InType(5);

    /// 16-bit unsigned integer.
    pub const UInt16: InType = InType(6);

    /// 32-bit signed integer.
    pub const Int32: InType = InType(7);

    /// 32-bit unsigned integer.
    pub const UInt32: InType = InType(8);

    /// 64-bit signed integer.
    pub const Int64: InType = InType(9);

    /// 64-bit unsigned integer.
    pub const UInt64: InType = InType(10);

    /// 32-bit IEEE float.
    pub const Float: InType = InType(11);

    /// 64-bit IEEE float.
    pub const Double: InType = InType(12);

    /// 32-bit boolean, 0 = false, nonzero = true.
    pub const Bool32: InType = InType(13);

    /// 32-bit unsigned integer, formatted as hex.
    pub const HexInt32: InType = InType(20);

    /// 64-bit unsigned integer, formatted as hex.
    pub const HexInt64: InType = InType(21);

    /// Pointer-sized hex value. This is an alias for either `HexInt32` or `HexInt64`
    /// depending on the target.
    pub const Pointer: InType = if size_of::<usize>() == 8 {
        Self::HexInt64
    } else {
        Self::HexInt32
    };

    /// Returns the number of payload bytes used by a value of this type, or `None`
    /// for variable-length (string) and unrecognized types.
    pub const fn fixed_size(self) -> Option<usize> {
        return match self.0 {
            3 | 4 => Some(1),
            5 | 6 => Some(2),
            7 | 8 | 11 | 13 | 20 => Some(4),
            9 | 10 | 12 | 21 => Some(8),
            _ => None,
        };
    }

    /// Returns true if this is one of the defined in-type values.
    pub const fn is_known(self) -> bool {
        return matches!(self.0, 1..=13 | 20 | 21);
    }
}

impl fmt::Display for InType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return self.0.fmt(f);
    }
}

impl From<u8> for InType {
    fn from(val: u8) -> Self {
        return Self(val);
    }
}

impl From<InType> for u8 {
    fn from(val: InType) -> Self {
        return val.0;
    }
}

/// Role of the bytes referenced by an [`EventDataDescriptor`]: payload, event
/// metadata, or provider traits.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DataKind(u8);

impl DataKind {
    /// Returns a DataKind with the specified value.
    pub const fn from_int(value: u8) -> DataKind {
        return DataKind(value);
    }

    /// Returns the numeric value corresponding to this DataKind value.
    pub const fn as_int(self) -> u8 {
        return self.0;
    }

    /// Field value bytes (`EVENT_DATA_DESCRIPTOR_TYPE_NONE`).
    pub const Payload: DataKind = DataKind(0);

    /// Event metadata blob (`EVENT_DATA_DESCRIPTOR_TYPE_EVENT_METADATA`).
    pub const EventMetadata: DataKind = DataKind(1);

    /// Provider traits blob (`EVENT_DATA_DESCRIPTOR_TYPE_PROVIDER_METADATA`).
    pub const ProviderMetadata: DataKind = DataKind(2);
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return self.0.fmt(f);
    }
}

impl From<u8> for DataKind {
    fn from(val: u8) -> Self {
        return Self(val);
    }
}

impl From<DataKind> for u8 {
    fn from(val: DataKind) -> Self {
        return val.0;
    }
}
