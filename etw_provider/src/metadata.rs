// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::str;

use crate::enums::InType;
use crate::guid::Guid;

/// Size of the header at the start of an event metadata blob:
/// `u16 total_size` followed by a `u8` tag byte.
pub const EVENT_METADATA_HEADER_LEN: usize = 3;

/// Largest blob that can be described by the 16-bit size prefix.
pub const METADATA_SIZE_MAX: usize = u16::MAX as usize;

const PROVIDER_TRAIT_GROUP: u8 = 1;
const PROVIDER_TRAIT_GROUP_LEN: usize = 2 + 1 + 16;

/// A named, typed field of an event: `field_name ++ NUL ++ u8(in_type)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldSpec<'a> {
    name: &'a str,
    in_type: InType,
}

impl<'a> FieldSpec<'a> {
    /// Creates a field with the specified name and type.
    ///
    /// The name must not contain `'\0'`. This is checked when the field is encoded.
    pub const fn new(name: &'a str, in_type: InType) -> Self {
        return Self { name, in_type };
    }

    /// Returns the field's name.
    pub const fn name(&self) -> &'a str {
        return self.name;
    }

    /// Returns the field's type.
    pub const fn in_type(&self) -> InType {
        return self.in_type;
    }

    /// Returns the number of bytes used by this field's encoding.
    pub const fn encoded_len(&self) -> usize {
        return self.name.len() + 2;
    }

    /// Returns this field's encoding.
    ///
    /// `N` must equal [`FieldSpec::encoded_len`]. This is checked at compile time
    /// when used in a const context.
    pub const fn encode<const N: usize>(&self) -> [u8; N] {
        assert!(N == self.encoded_len(), "N must equal FieldSpec::encoded_len()");
        let mut block = [0u8; N];
        let name = self.name.as_bytes();
        let mut i = 0;
        while i < name.len() {
            assert!(name[i] != 0, "field name must not contain '\\0'");
            block[i] = name[i];
            i += 1;
        }
        block[i] = 0;
        block[i + 1] = self.in_type.as_int();
        return block;
    }
}

/// Returns the size of the event metadata blob for the specified event name and
/// fields: `3 + len(name)+1 + Σ(len(field_name)+2)`.
///
/// Panics (at compile time, when evaluated in a const context) if the result does
/// not fit in the 16-bit size prefix.
pub const fn event_metadata_len(name: &str, fields: &[FieldSpec<'_>]) -> usize {
    let mut len = EVENT_METADATA_HEADER_LEN + name.len() + 1;
    let mut i = 0;
    while i < fields.len() {
        len += fields[i].encoded_len();
        i += 1;
    }
    assert!(len <= METADATA_SIZE_MAX, "event metadata must not exceed 65535 bytes");
    return len;
}

/// Immutable metadata blob for one event, built by a `const fn`.
///
/// Layout: `u16 LE total_size ++ u8 0 ++ name ++ NUL ++ Σ(field_name ++ NUL ++ u8 in_type)`.
///
/// `N` must equal [`event_metadata_len`] for the same inputs. The
/// [`event_metadata!`](crate::event_metadata) macro computes it automatically.
///
/// ```
/// # use etw_provider::*;
/// const FIELDS: &[FieldSpec] = &[FieldSpec::new("element_count", InType::Int32)];
/// static META: EventMetadata<{ event_metadata_len("StartSort", FIELDS) }> =
///     EventMetadata::new("StartSort", FIELDS);
/// assert_eq!(META.as_bytes().len(), 28);
/// assert_eq!(&META.as_bytes()[0..3], &[28, 0, 0]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventMetadata<const N: usize>([u8; N]);

impl<const N: usize> EventMetadata<N> {
    /// Encodes the metadata for an event with the specified name and fields.
    ///
    /// Panics if `N` is not the encoded size, or if a name contains `'\0'`.
    /// In a `const`/`static` initializer these become compile errors.
    pub const fn new(name: &str, fields: &[FieldSpec<'_>]) -> Self {
        assert!(
            N == event_metadata_len(name, fields),
            "N must equal event_metadata_len(name, fields)"
        );

        let mut blob = [0u8; N];
        let size = (N as u16).to_le_bytes();
        blob[0] = size[0];
        blob[1] = size[1];
        blob[2] = 0;
        let mut pos = EVENT_METADATA_HEADER_LEN;

        let name = name.as_bytes();
        let mut i = 0;
        while i < name.len() {
            assert!(name[i] != 0, "event name must not contain '\\0'");
            blob[pos] = name[i];
            pos += 1;
            i += 1;
        }
        blob[pos] = 0;
        pos += 1;

        let mut field_index = 0;
        while field_index < fields.len() {
            let field = &fields[field_index];
            let field_name = field.name.as_bytes();
            i = 0;
            while i < field_name.len() {
                assert!(field_name[i] != 0, "field name must not contain '\\0'");
                blob[pos] = field_name[i];
                pos += 1;
                i += 1;
            }
            blob[pos] = 0;
            blob[pos + 1] = field.in_type.as_int();
            pos += 2;
            field_index += 1;
        }

        assert!(pos == N);
        return Self(blob);
    }

    /// Returns the encoded blob.
    pub const fn as_bytes(&self) -> &[u8] {
        return &self.0;
    }
}

/// Returns the part of `name` that fits in a provider traits blob: everything
/// before the first `'\0'`, shortened on a character boundary if the blob would
/// otherwise exceed 65535 bytes.
pub fn provider_traits_name<'a>(name: &'a str, group_id: Option<&Guid>) -> &'a str {
    let group_len = if group_id.is_some() {
        PROVIDER_TRAIT_GROUP_LEN
    } else {
        0
    };
    let max_len = METADATA_SIZE_MAX - 2 - 1 - group_len;

    let mut end = name.find('\0').unwrap_or(name.len());
    if end > max_len {
        end = max_len;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
    }

    return &name[..end];
}

/// Builds a provider traits blob: `u16 LE total_size ++ name ++ NUL`, followed by
/// a group trait record if `group_id` is present.
///
/// The name is first passed through [`provider_traits_name`], so a name
/// containing `'\0'` or one too long for the size prefix is truncated.
pub fn provider_traits(name: &str, group_id: Option<&Guid>) -> Box<[u8]> {
    let name = provider_traits_name(name, group_id);
    let group_len = if group_id.is_some() {
        PROVIDER_TRAIT_GROUP_LEN
    } else {
        0
    };
    let total = 2 + name.len() + 1 + group_len;

    let mut traits = Vec::with_capacity(total);
    traits.extend_from_slice(&(total as u16).to_le_bytes());
    traits.extend_from_slice(name.as_bytes());
    traits.push(0);
    if let Some(group_id) = group_id {
        traits.extend_from_slice(&(PROVIDER_TRAIT_GROUP_LEN as u16).to_le_bytes());
        traits.push(PROVIDER_TRAIT_GROUP);
        traits.extend_from_slice(&group_id.to_bytes_le());
    }

    debug_assert_eq!(traits.len(), total);
    return traits.into_boxed_slice();
}

/// Reasons an event metadata blob failed to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// Blob is shorter than the 3-byte header.
    #[error("metadata truncated: {0} bytes is shorter than the header")]
    Truncated(usize),

    /// Size prefix does not match the blob length.
    #[error("metadata size prefix is {declared} but blob is {actual} bytes")]
    SizeMismatch {
        /// Value of the size prefix.
        declared: usize,
        /// Length of the blob.
        actual: usize,
    },

    /// Tag byte after the size prefix is not 0.
    #[error("metadata tag byte is {0}, expected 0")]
    UnexpectedTag(u8),

    /// A name is missing its NUL terminator or a field is missing its type byte.
    #[error("metadata name at offset {0} is not terminated")]
    Unterminated(usize),

    /// A name is not valid UTF-8.
    #[error("metadata name at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    /// A field's in-type is not a defined value.
    #[error("field at offset {offset} has unknown in-type {in_type}")]
    UnknownInType {
        /// Offset of the field's name.
        offset: usize,
        /// The unrecognized type byte.
        in_type: u8,
    },
}

/// Validated, borrowed view of an event metadata blob.
#[derive(Clone, Copy)]
pub struct EventMetadataView<'a> {
    name: &'a str,
    fields: &'a [u8],
    field_count: usize,
}

impl<'a> EventMetadataView<'a> {
    /// Validates the blob and returns a view of its contents.
    pub fn parse(blob: &'a [u8]) -> Result<Self, MetadataError> {
        if blob.len() < EVENT_METADATA_HEADER_LEN {
            return Err(MetadataError::Truncated(blob.len()));
        }

        let declared = u16::from_le_bytes([blob[0], blob[1]]) as usize;
        if declared != blob.len() {
            return Err(MetadataError::SizeMismatch {
                declared,
                actual: blob.len(),
            });
        }

        if blob[2] != 0 {
            return Err(MetadataError::UnexpectedTag(blob[2]));
        }

        let (name, fields) = split_name(blob, EVENT_METADATA_HEADER_LEN)?;

        let mut field_count = 0;
        let mut pos = EVENT_METADATA_HEADER_LEN + name.len() + 1;
        while pos < blob.len() {
            let (field_name, rest) = split_name(blob, pos)?;
            let in_type = match rest.first() {
                Some(&in_type) => in_type,
                None => return Err(MetadataError::Unterminated(pos)),
            };
            if !InType::from_int(in_type).is_known() {
                return Err(MetadataError::UnknownInType {
                    offset: pos,
                    in_type,
                });
            }
            pos += field_name.len() + 2;
            field_count += 1;
        }

        return Ok(Self {
            name,
            fields,
            field_count,
        });
    }

    /// Returns the event name.
    pub fn name(&self) -> &'a str {
        return self.name;
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        return self.field_count;
    }

    /// Returns an iterator over the fields in declaration order.
    pub fn fields(&self) -> FieldSpecs<'a> {
        return FieldSpecs {
            remaining: self.fields,
        };
    }
}

impl fmt::Debug for EventMetadataView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f
            .debug_struct("EventMetadataView")
            .field("name", &self.name)
            .field("fields", &DebugFields(*self))
            .finish();
    }
}

struct DebugFields<'a>(EventMetadataView<'a>);

impl fmt::Debug for DebugFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.debug_list().entries(self.0.fields()).finish();
    }
}

/// Iterator over the fields of an [`EventMetadataView`].
#[derive(Clone, Debug)]
pub struct FieldSpecs<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for FieldSpecs<'a> {
    type Item = FieldSpec<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // Contents were validated by EventMetadataView::parse.
        let nul = self.remaining.iter().position(|&b| b == 0)?;
        let in_type = *self.remaining.get(nul + 1)?;
        let name = str::from_utf8(&self.remaining[..nul]).ok()?;
        self.remaining = &self.remaining[nul + 2..];
        return Some(FieldSpec::new(name, InType::from_int(in_type)));
    }
}

/// Splits `blob[pos..]` into a NUL-terminated UTF-8 name and the bytes after the NUL.
fn split_name(blob: &[u8], pos: usize) -> Result<(&str, &[u8]), MetadataError> {
    let bytes = &blob[pos..];
    let nul = match bytes.iter().position(|&b| b == 0) {
        Some(nul) => nul,
        None => return Err(MetadataError::Unterminated(pos)),
    };
    let name = match str::from_utf8(&bytes[..nul]) {
        Ok(name) => name,
        Err(_) => return Err(MetadataError::InvalidUtf8(pos)),
    };
    return Ok((name, &bytes[nul + 1..]));
}
