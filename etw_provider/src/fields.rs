// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::ffi::CStr;
use core::mem::size_of;
use core::slice;

use crate::descriptors::EventDataDescriptor;
use crate::enums::InType;

/// A plain-data value that can be written as a fixed-width field by reference to
/// its bytes.
///
/// # Safety
///
/// Implementing types must have no padding bytes and no invalid bit patterns,
/// and `IN_TYPE` must describe a value of exactly `size_of::<Self>()` bytes.
pub unsafe trait ValueField: Copy {
    /// In-type recorded in metadata for a field holding this type.
    const IN_TYPE: InType;
}

unsafe impl ValueField for i8 {
    const IN_TYPE: InType = InType::Int8;
}
unsafe impl ValueField for u8 {
    const IN_TYPE: InType = InType::UInt8;
}
unsafe impl ValueField for i16 {
    const IN_TYPE: InType = InType::Int16;
}
unsafe impl ValueField for u16 {
    const IN_TYPE: InType = InType::UInt16;
}
unsafe impl ValueField for i32 {
    const IN_TYPE: InType = InType::Int32;
}
unsafe impl ValueField for u32 {
    const IN_TYPE: InType = InType::UInt32;
}
unsafe impl ValueField for i64 {
    const IN_TYPE: InType = InType::Int64;
}
unsafe impl ValueField for u64 {
    const IN_TYPE: InType = InType::UInt64;
}
unsafe impl ValueField for f32 {
    const IN_TYPE: InType = InType::Float;
}
unsafe impl ValueField for f64 {
    const IN_TYPE: InType = InType::Double;
}
unsafe impl ValueField for usize {
    const IN_TYPE: InType = InType::Pointer;
}
unsafe impl<T> ValueField for *const T {
    const IN_TYPE: InType = InType::Pointer;
}
unsafe impl<T> ValueField for *mut T {
    const IN_TYPE: InType = InType::Pointer;
}

/// A pointer-sized value, written with [`InType::Pointer`].
pub trait PointerField: ValueField {}
impl PointerField for usize {}
impl<T> PointerField for *const T {}
impl<T> PointerField for *mut T {}

/// A borrowed NUL-terminated UTF-16 string.
///
/// ```
/// # use etw_provider::WStr;
/// let units: Vec<u16> = "abc".encode_utf16().chain([0]).collect();
/// let s = WStr::from_slice_with_nul(&units).unwrap();
/// assert_eq!(s.len(), 3);
/// assert_eq!(s.as_slice_with_nul().len(), 4);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WStr<'a>(&'a [u16]);

impl<'a> WStr<'a> {
    /// The empty string.
    pub const EMPTY: WStr<'static> = WStr(&[0]);

    /// Returns the string that ends at the first NUL in `units`, or None if
    /// `units` contains no NUL.
    pub fn from_slice_with_nul(units: &'a [u16]) -> Option<Self> {
        let nul = units.iter().position(|&u| u == 0)?;
        return Some(Self(&units[..nul + 1]));
    }

    /// Number of UTF-16 code units, not counting the NUL.
    pub const fn len(&self) -> usize {
        return self.0.len() - 1;
    }

    /// Returns true if the string has no code units before the NUL.
    pub const fn is_empty(&self) -> bool {
        return self.0.len() == 1;
    }

    /// Code units, not including the NUL.
    pub fn as_slice(&self) -> &'a [u16] {
        return &self.0[..self.0.len() - 1];
    }

    /// Code units including the NUL.
    pub const fn as_slice_with_nul(&self) -> &'a [u16] {
        return self.0;
    }
}

/// One event argument, borrowed for the duration of a write.
///
/// Each variant corresponds to a marshalling rule for the payload bytes:
/// a fixed-width value uses `size_of` bytes, a narrow string uses `len + 1` bytes,
/// and a wide string uses `2 * len + 2` bytes. Nothing is copied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldData<'a> {
    /// The bytes of a fixed-width value.
    Value(&'a [u8]),

    /// A narrow string, including its NUL.
    Str8(&'a [u8]),

    /// A wide string, including its NUL.
    Str16(&'a [u16]),
}

impl<'a> FieldData<'a> {
    /// References the bytes of a fixed-width value.
    pub fn value<T: ValueField>(value: &'a T) -> Self {
        // Safety: ValueField types are plain data without padding.
        let bytes = unsafe { slice::from_raw_parts(value as *const T as *const u8, size_of::<T>()) };
        return FieldData::Value(bytes);
    }

    /// References a NUL-terminated narrow string.
    pub fn str8(value: &'a CStr) -> Self {
        return FieldData::Str8(value.to_bytes_with_nul());
    }

    /// References a NUL-terminated wide string.
    pub fn str16(value: WStr<'a>) -> Self {
        return FieldData::Str16(value.as_slice_with_nul());
    }

    /// Number of payload bytes referenced by this argument.
    pub fn byte_len(&self) -> usize {
        return match self {
            FieldData::Value(bytes) => bytes.len(),
            FieldData::Str8(bytes) => bytes.len(),
            FieldData::Str16(units) => units.len() * 2,
        };
    }

    /// Returns true if a field declared with `in_type` can be written with this
    /// argument.
    ///
    /// A `Value` carries only its bytes, so it is compared by size: any 4-byte
    /// value is compatible with `Int32`, `UInt32`, `Float`, `Bool32` and
    /// `HexInt32` alike. Strings must match their string in-type exactly.
    pub fn is_compatible(&self, in_type: InType) -> bool {
        return match self {
            FieldData::Value(bytes) => in_type.fixed_size() == Some(bytes.len()),
            FieldData::Str8(_) => in_type == InType::AnsiString,
            FieldData::Str16(_) => in_type == InType::UnicodeString,
        };
    }

    /// Returns a payload descriptor referencing this argument.
    pub fn descriptor(&self) -> EventDataDescriptor<'a> {
        return match *self {
            FieldData::Value(bytes) => EventDataDescriptor::from_bytes(bytes),
            FieldData::Str8(bytes) => EventDataDescriptor::from_bytes(bytes),
            FieldData::Str16(units) => EventDataDescriptor::from_slice(units),
        };
    }
}

/// Typed marshallers for [`write_event!`](crate::write_event) field kinds.
///
/// Each module pairs the in-type written to metadata with a `data` function that
/// accepts only the matching Rust type, so the tag and the argument always agree.
pub mod kinds {
    macro_rules! value_kinds {
        ($($kind:ident: $ty:ty => $in_type:ident;)*) => {
            $(
                #[allow(missing_docs)]
                pub mod $kind {
                    use crate::enums::InType;
                    use crate::fields::FieldData;

                    pub const IN_TYPE: InType = InType::$in_type;

                    #[inline(always)]
                    pub fn data(value: &$ty) -> FieldData<'_> {
                        return FieldData::value(value);
                    }
                }
            )*
        };
    }

    value_kinds! {
        int8: i8 => Int8;
        uint8: u8 => UInt8;
        int16: i16 => Int16;
        uint16: u16 => UInt16;
        int32: i32 => Int32;
        uint32: u32 => UInt32;
        int64: i64 => Int64;
        uint64: u64 => UInt64;
        float: f32 => Float;
        double: f64 => Double;
        bool32: i32 => Bool32;
        hex_int32: u32 => HexInt32;
        hex_int64: u64 => HexInt64;
    }

    #[allow(missing_docs)]
    pub mod pointer {
        use crate::enums::InType;
        use crate::fields::FieldData;
        use crate::fields::PointerField;

        pub const IN_TYPE: InType = InType::Pointer;

        #[inline(always)]
        pub fn data<P: PointerField>(value: &P) -> FieldData<'_> {
            return FieldData::value(value);
        }
    }

    #[allow(missing_docs)]
    pub mod ansi_str {
        use core::ffi::CStr;

        use crate::enums::InType;
        use crate::fields::FieldData;

        pub const IN_TYPE: InType = InType::AnsiString;

        #[inline(always)]
        pub fn data<'a>(value: &&'a CStr) -> FieldData<'a> {
            return FieldData::str8(value);
        }
    }

    #[allow(missing_docs)]
    pub mod unicode_str {
        use crate::enums::InType;
        use crate::fields::FieldData;
        use crate::fields::WStr;

        pub const IN_TYPE: InType = InType::UnicodeString;

        #[inline(always)]
        pub fn data<'a>(value: &WStr<'a>) -> FieldData<'a> {
            return FieldData::str16(*value);
        }
    }
}
