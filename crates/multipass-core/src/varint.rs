//! Variable-length Integer Encoding (Varint) and ZigZag Mapping
//!
//! This module provides the two numeric codecs the record format is built on:
//!
//! ## Varint Encoding
//! Instead of always using 8 bytes for a u64, varints use only as many bytes
//! as needed:
//! - Small numbers (0-127) use just 1 byte
//! - Larger numbers use 2-10 bytes depending on magnitude
//! - Each byte uses 7 bits for data and 1 bit as a "continuation" flag
//!
//! Every encoded value consists of zero or more continuation bytes (high bit
//! set) followed by exactly one terminal byte (high bit clear). The terminal
//! byte is always present, even when it contributes no additional bits, so
//! every value occupies at least one byte.
//!
//! ## ZigZag Encoding (for signed integers)
//! Maps signed integers to unsigned so small negative numbers are also
//! efficient:
//! - 0 → 0, -1 → 1, 1 → 2, -2 → 3, 2 → 4, etc.
//! - This means a delta of -1 encodes to 1 byte instead of 8 bytes
//!
//! ## Why This Matters for MultiPass
//! Feature indices within a namespace are usually close to sorted, so
//! index-to-index deltas are small (of either sign). ZigZag keeps both signs
//! compact and varints keep small magnitudes at one byte, which is what makes
//! the cached form of an example smaller than its text form.
//!
//! ## Usage
//! ```ignore
//! let mut buf = Vec::new();
//! encode_varint_u64(&mut buf, zigzag_encode(-3));
//! let delta = zigzag_decode(decode_varint_u64(&mut &buf[..])?);
//! assert_eq!(delta, -3);
//! ```

use crate::error::{Error, Result};
use bytes::{Buf, BufMut};

/// Encode an unsigned integer as a varint.
pub fn encode_varint_u64(buf: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    // Terminal byte, high bit clear. Emitted even when it encodes zero bits.
    buf.put_u8(value as u8);
}

/// Decode a varint to an unsigned integer.
///
/// Consumes continuation bytes while the high bit is set, then exactly one
/// terminal byte. Running out of input mid-value is `TruncatedVarint`; more
/// than ten bytes is `VarintOverflow`.
pub fn decode_varint_u64(buf: &mut impl Buf) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        if !buf.has_remaining() {
            return Err(Error::TruncatedVarint);
        }
        let byte = buf.get_u8();

        if byte & 0x80 == 0 {
            // Terminal byte.
            return Ok(value | ((byte as u64) << shift));
        }

        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if shift >= 64 {
            return Err(Error::VarintOverflow);
        }
    }
}

/// Number of bytes `encode_varint_u64` will emit for `value`.
pub fn varint_len(value: u64) -> usize {
    // ceil(bits/7), minimum one byte for the terminal byte
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Map a signed integer to an unsigned one, keeping small magnitudes small.
///
/// 0 → 0, -1 → 1, 1 → 2, -2 → 3, 2 → 4, ...
pub fn zigzag_encode(n: i64) -> u64 {
    // (n << 1) ^ (n >> 63) with arithmetic right shift; the left shift wraps
    // so i64::MIN maps to u64::MAX.
    (n.wrapping_shl(1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode`], total over the whole `i64` range.
pub fn zigzag_decode(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}
