// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::fmt;
use core::str;

/// 128-bit identity of an ETW provider, or an activity id.
///
/// Stored in big-endian (RFC 4122) byte order. Use [`Guid::to_bytes_le`] for the
/// Windows in-memory layout.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Guid([u8; 16]);

impl Guid {
    /// Returns a zeroed GUID, i.e. GUID_NULL.
    pub const fn zero() -> Self {
        return Self([0; 16]);
    }

    /// Returns the provider id conventionally used for a manifest-free provider
    /// with the specified name.
    ///
    /// The id is a case-insensitive hash of the name, computed the same way as
    /// other ETW tooling (e.g. `tracelog`, `wpr`, PerfView's `*Name` syntax), so
    /// sessions can enable the provider by name.
    /// ```
    /// # use etw_provider::Guid;
    /// assert_eq!(
    ///    Guid::from_name("MyProvider"),
    ///    Guid::from_u128(&0xb3864c38_4273_58c5_545b_8b3608343471));
    /// ```
    pub fn from_name(provider_name: &str) -> Self {
        const NAMESPACE: [u8; 16] = [
            0x48, 0x2C, 0x2D, 0xB2, 0xC3, 0x90, 0x47, 0xC8, 0x87, 0xF8, 0x1A, 0x15, 0xBF, 0xC1,
            0x30, 0xFB,
        ];

        let mut hasher = Sha1NonSecret::new();
        hasher.write(&NAMESPACE);

        // Name is hashed as uppercase UTF-16BE.
        let mut units = [0u16; 2];
        for upper in provider_name.chars().flat_map(char::to_uppercase) {
            for unit in upper.encode_utf16(&mut units) {
                hasher.write(&unit.to_be_bytes());
            }
        }

        let hash = hasher.finish();
        let mut bytes_le = [0u8; 16];
        bytes_le.copy_from_slice(&hash[..16]);
        bytes_le[7] = (bytes_le[7] & 0x0F) | 0x50;
        return Self::from_bytes_le(&bytes_le);
    }

    /// Creates a GUID from field values.
    /// ```
    /// # use etw_provider::Guid;
    /// assert_eq!(
    ///     Guid::from_fields(0xa3a2a1a0, 0xb1b0, 0xc1c0, [0xd7, 0xd6, 0xd5, 0xd4, 0xd3, 0xd2, 0xd1, 0xd0]),
    ///     Guid::from_u128(&0xa3a2a1a0_b1b0_c1c0_d7d6d5d4d3d2d1d0));
    /// ```
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        let mut bytes = [0u8; 16];
        let b1 = data1.to_be_bytes();
        let b2 = data2.to_be_bytes();
        let b3 = data3.to_be_bytes();
        let mut i = 0;
        while i < 4 {
            bytes[i] = b1[i];
            i += 1;
        }
        bytes[4] = b2[0];
        bytes[5] = b2[1];
        bytes[6] = b3[0];
        bytes[7] = b3[1];
        i = 0;
        while i < 8 {
            bytes[8 + i] = data4[i];
            i += 1;
        }
        return Self(bytes);
    }

    /// Creates a GUID from bytes in big-endian (RFC) byte order.
    pub const fn from_bytes_be(bytes_be: &[u8; 16]) -> Self {
        return Self(*bytes_be);
    }

    /// Creates a GUID from bytes in Windows (little-endian fields) byte order.
    /// ```
    /// # use etw_provider::Guid;
    /// assert_eq!(
    ///     Guid::from_u128(&0xa3a2a1a0_b1b0_c1c0_d7d6d5d4d3d2d1d0),
    ///     Guid::from_bytes_le(&[0xa0, 0xa1, 0xa2, 0xa3, 0xb0, 0xb1, 0xc0, 0xc1, 0xd7, 0xd6, 0xd5, 0xd4, 0xd3, 0xd2, 0xd1, 0xd0]));
    /// ```
    pub const fn from_bytes_le(bytes_le: &[u8; 16]) -> Self {
        return Self(Self::swap_fields(bytes_le));
    }

    /// Creates a GUID from a u128 value.
    pub const fn from_u128(value: &u128) -> Self {
        return Self(value.to_be_bytes());
    }

    /// Creates a GUID from a string such as `"{a3a2a1a0-b1b0-c1c0-d7d6-d5d4d3d2d1d0}"`.
    /// Braces and dashes are optional. Returns None if the input is not a GUID.
    /// ```
    /// # use etw_provider::Guid;
    /// let expected = Guid::from_u128(&0xa3a2a1a0_b1b0_c1c0_d7d6d5d4d3d2d1d0);
    /// assert_eq!(Some(expected), Guid::try_parse("{a3a2a1a0-b1b0-c1c0-d7d6-d5d4d3d2d1d0}"));
    /// assert_eq!(Some(expected), Guid::try_parse("A3A2A1A0-B1B0-C1C0-D7D6-D5D4D3D2D1D0"));
    /// assert_eq!(Some(expected), Guid::try_parse("a3a2a1a0b1b0c1c0d7d6d5d4d3d2d1d0"));
    /// assert_eq!(None, Guid::try_parse("a3a2a1a0-b1b0-c1c0-d7d6"));
    /// ```
    pub fn try_parse(value: &str) -> Option<Self> {
        let mut input = value.as_bytes();
        if input.len() >= 2 && input[0] == b'{' && input[input.len() - 1] == b'}' {
            input = &input[1..input.len() - 1];
        }

        let dashed = match input.len() {
            32 => false,
            36 => {
                if input[8] != b'-' || input[13] != b'-' || input[18] != b'-' || input[23] != b'-' {
                    return None;
                }
                true
            }
            _ => return None,
        };

        let mut bytes = [0u8; 16];
        let mut pos = 0;
        for (i, byte) in bytes.iter_mut().enumerate() {
            if dashed && (i == 4 || i == 6 || i == 8 || i == 10) {
                pos += 1;
            }
            let high = Self::hex_value(input[pos])?;
            let low = Self::hex_value(input[pos + 1])?;
            *byte = (high << 4) | low;
            pos += 2;
        }

        return Some(Self(bytes));
    }

    /// Returns the field values of the GUID as a tuple.
    #[allow(clippy::wrong_self_convention)]
    pub const fn to_fields(&self) -> (u32, u16, u16, [u8; 8]) {
        let b = &self.0;
        return (
            u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
            u16::from_be_bytes([b[4], b[5]]),
            u16::from_be_bytes([b[6], b[7]]),
            [b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]],
        );
    }

    /// Returns the bytes of the GUID in RFC byte order (big-endian).
    #[allow(clippy::wrong_self_convention)]
    pub const fn to_bytes_be(&self) -> [u8; 16] {
        return self.0;
    }

    /// Returns the bytes of the GUID in Windows byte order (little-endian fields).
    #[allow(clippy::wrong_self_convention)]
    pub const fn to_bytes_le(&self) -> [u8; 16] {
        return Self::swap_fields(&self.0);
    }

    /// Returns the GUID as a u128 value.
    #[allow(clippy::wrong_self_convention)]
    pub const fn to_u128(&self) -> u128 {
        return u128::from_be_bytes(self.0);
    }

    /// Returns the GUID as lowercase utf8 text, e.g. `a3a2a1a0-b1b0-c1c0-d7d6-d5d4d3d2d1d0`.
    #[allow(clippy::wrong_self_convention)]
    pub const fn to_utf8_bytes(&self) -> [u8; 36] {
        const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";
        let mut text = [b'-'; 36];
        let mut pos = 0;
        let mut i = 0;
        while i < 16 {
            if i == 4 || i == 6 || i == 8 || i == 10 {
                pos += 1;
            }
            text[pos] = HEX_DIGITS[(self.0[i] >> 4) as usize];
            text[pos + 1] = HEX_DIGITS[(self.0[i] & 0xf) as usize];
            pos += 2;
            i += 1;
        }
        return text;
    }

    /// Converts between RFC and Windows byte orders (the conversion is symmetric).
    const fn swap_fields(b: &[u8; 16]) -> [u8; 16] {
        return [
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12], b[13],
            b[14], b[15],
        ];
    }

    fn hex_value(ch: u8) -> Option<u8> {
        return match ch {
            b'0'..=b'9' => Some(ch - b'0'),
            b'a'..=b'f' => Some(ch - b'a' + 10),
            b'A'..=b'F' => Some(ch - b'A' + 10),
            _ => None,
        };
    }
}

impl fmt::Display for Guid {
    /// Format the GUID, e.g. "a3a2a1a0-b1b0-c1c0-d7d6-d5d4d3d2d1d0".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_utf8_bytes();
        return match str::from_utf8(&text) {
            Ok(s) => f.write_str(s),
            Err(_) => Err(fmt::Error),
        };
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return fmt::Display::fmt(self, f);
    }
}

impl From<u128> for Guid {
    fn from(value: u128) -> Self {
        return Self::from_u128(&value);
    }
}

/// Single-use SHA1 hasher (finish() is destructive). Only for hashing public
/// information such as provider names: buffers are not scrubbed.
struct Sha1NonSecret {
    chunk: [u8; 64],
    chunk_count: u32,
    chunk_pos: u8,
    results: [u32; 5],
}

impl Sha1NonSecret {
    fn new() -> Self {
        return Self {
            chunk: [0; 64],
            chunk_count: 0,
            chunk_pos: 0,
            results: [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0],
        };
    }

    fn write_u8(&mut self, val: u8) {
        self.chunk[self.chunk_pos as usize] = val;
        self.chunk_pos = (self.chunk_pos + 1) & 63;
        if self.chunk_pos == 0 {
            self.drain();
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_u8(b);
        }
    }

    fn finish(&mut self) -> [u8; 20] {
        // Bit count must be captured before padding.
        let total_bit_count = (self.chunk_count as u64 * 512) + (self.chunk_pos as u64 * 8);

        self.write_u8(0x80);
        while self.chunk_pos != 56 {
            self.write_u8(0);
        }
        self.write(&total_bit_count.to_be_bytes());
        debug_assert_eq!(self.chunk_pos, 0);

        let mut sha1 = [0u8; 20];
        for (out, result) in sha1.chunks_exact_mut(4).zip(self.results.iter()) {
            out.copy_from_slice(&result.to_be_bytes());
        }
        return sha1;
    }

    fn drain(&mut self) {
        let mut w = [0u32; 80];
        for (i, word) in self.chunk.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
        }
        for i in 16..80 {
            w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
        }

        let [mut a, mut b, mut c, mut d, mut e] = self.results;
        for (i, &wi) in w.iter().enumerate() {
            let (f, k) = match i / 20 {
                0 => ((b & c) | (!b & d), 0x5A827999),
                1 => (b ^ c ^ d, 0x6ED9EBA1),
                2 => ((b & c) | (b & d) | (c & d), 0x8F1BBCDC),
                _ => (b ^ c ^ d, 0xCA62C1D6),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(wi);
            e = d;
            d = c;
            c = b.rotate_left(30);
            b = a;
            a = temp;
        }

        for (result, value) in self.results.iter_mut().zip([a, b, c, d, e]) {
            *result = result.wrapping_add(value);
        }
        self.chunk_count += 1;
    }
}
