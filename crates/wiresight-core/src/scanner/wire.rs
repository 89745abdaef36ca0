//! Low-level protobuf wire format parsing.
//!
//! This module implements the wire format primitives used by the
//! schema-less scanner: varint decoding and tag decomposition.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! Wire types 3 and 4 (group start/end) are deprecated and rejected.

use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;
use serde::Serialize;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl WireType {
    /// Decode the low three bits of a field tag into a wire type.
    ///
    /// Returns `None` for the reserved values 6 and 7.
    pub fn from_tag_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(WireType::Varint),
            1 => Some(WireType::I64),
            2 => Some(WireType::Len),
            3 => Some(WireType::StartGroup),
            4 => Some(WireType::EndGroup),
            5 => Some(WireType::I32),
            _ => None,
        }
    }

    /// Returns true for the deprecated group wire types
    pub fn is_group(self) -> bool {
        matches!(self, WireType::StartGroup | WireType::EndGroup)
    }
}

/// Maximum number of bytes in a valid varint encoding of a 64-bit value
pub const MAX_VARINT_LEN: usize = 10;

/// Decode a varint from the given bytes.
///
/// `offset` is the position of `data[0]` in the original buffer and is used
/// only for error reporting. Returns the decoded value and the number of
/// bytes consumed.
pub fn decode_varint(data: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            // Varints are at most 10 bytes for a 64-bit value
            return Err(Error::malformed_varint(offset));
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    // Ran out of buffer with the continuation bit still set
    Err(Error::truncated(offset, data.len() + 1, data.len()))
}

/// A decoded field tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    /// The field number (validated to be in 1..=MAX_FIELD_NUMBER)
    pub field_number: u32,
    /// The wire type
    pub wire_type: WireType,
    /// Bytes consumed by the tag varint
    pub len: usize,
}

/// Decode and validate a field tag at the start of `data`.
///
/// A field number of zero or beyond the protobuf maximum is a hard error,
/// as are the reserved wire types 6 and 7. The deprecated group wire types
/// decode successfully here; rejecting them is the caller's dispatch
/// decision.
pub fn decode_tag(data: &[u8], offset: usize) -> Result<Tag> {
    if data.is_empty() {
        return Err(Error::truncated(offset, 1, 0));
    }

    let (tag, tag_len) = decode_varint(data, offset)?;

    let bits = (tag & 0x07) as u8;
    let wire_type = WireType::from_tag_bits(bits)
        .ok_or_else(|| Error::unsupported_wire_type(offset, bits))?;

    let field_number = (tag >> 3) as u32;
    if field_number == 0 || (tag >> 3) > MAX_FIELD_NUMBER as u64 {
        return Err(Error::invalid_field_number(offset, field_number));
    }

    Ok(Tag {
        field_number,
        wire_type,
        len: tag_len,
    })
}
