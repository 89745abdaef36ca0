//! Schema-less scanning of raw protobuf wire bytes.
//!
//! This module decodes arbitrary wire-format data into a generic field tree
//! without any schema, for a best-effort structural view of blobs whose
//! message type is unknown.
//!
//! ## Algorithm Overview
//!
//! 1. Read a varint tag; split it into field number and wire type
//! 2. Dispatch on the wire type to consume the field value
//! 3. Classify length-delimited slices as text, a nested message, or
//!    opaque bytes (see [`WireScanner`] for the classification rule)
//! 4. On any mid-field error, stop and surface the accumulated fields
//!    together with the error (partial-success tolerant)
//!
//! Group wire types are deprecated and always rejected.

mod wire;

use crate::error::{Error, Result};
use serde::Serialize;
use tracing::{debug, trace};

pub use wire::{decode_tag, decode_varint, Tag, WireType, MAX_VARINT_LEN};

/// Number of leading bytes shown in the hex preview of opaque payloads
pub const HEX_PREVIEW_BYTES: usize = 32;

/// Fraction of printable characters a UTF-8 slice must exceed to classify
/// as text
pub const PRINTABLE_THRESHOLD: f64 = 0.9;

/// Default maximum nesting depth for the nested-message heuristic.
///
/// Termination is already guaranteed by byte consumption; the cap only
/// bounds stack depth on adversarial inputs.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A byte range into the buffer a field was scanned from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteSpan {
    /// Offset of the field tag in the root buffer
    pub offset: usize,
    /// Total length of the field including tag and value
    pub len: usize,
}

impl ByteSpan {
    /// Exclusive end offset of the span
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Returns true if `other` lies fully within this span
    pub fn contains(&self, other: &ByteSpan) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }
}

/// Interpretation of a length-delimited field scanned without a schema
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LenPayload {
    /// Valid, mostly-printable UTF-8
    Text(String),
    /// A well-formed nested message that consumed the entire slice
    Message(Vec<FieldNode>),
    /// Anything else: byte count plus a bounded hex preview
    Opaque {
        /// Total payload length in bytes
        len: usize,
        /// Hex rendering of the first [`HEX_PREVIEW_BYTES`] bytes
        preview: String,
    },
}

/// Value of a scanned field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPayload {
    /// Wire type 0, accumulated as an unsigned 64-bit value
    Varint(u64),
    /// Wire type 1, the raw little-endian bits
    Fixed64(u64),
    /// Wire type 5, the raw little-endian bits
    Fixed32(u32),
    /// Wire type 2, classified
    Len(LenPayload),
}

/// A single field in the scanned tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldNode {
    /// The field number from the tag
    pub number: u32,
    /// The wire type from the tag
    pub wire_type: WireType,
    /// The decoded value
    pub payload: FieldPayload,
    /// Location of this field in the root buffer
    pub span: ByteSpan,
}

/// Result of a scan: the fields read before any error, plus the error.
///
/// A scan that hits malformed data mid-stream keeps everything it already
/// decoded; callers get to show "what we can" for damaged capture data.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Fields accumulated in input order
    pub fields: Vec<FieldNode>,
    /// The error that stopped the scan, if any
    pub error: Option<Error>,
}

impl ScanOutcome {
    /// Returns true if the whole buffer was consumed without error
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Schema-less recursive wire scanner
#[derive(Debug, Clone)]
pub struct WireScanner {
    max_depth: usize,
}

impl Default for WireScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl WireScanner {
    /// Creates a scanner with the default nesting depth limit
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the maximum nesting depth for the nested-message heuristic
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Scan a buffer into a generic field tree.
    ///
    /// Never panics and never discards partial results: whatever fields
    /// were decoded before an error remain in the outcome.
    pub fn scan(&self, data: &[u8]) -> ScanOutcome {
        debug!("scanning {} bytes without schema", data.len());
        let outcome = self.scan_at(data, 0, 0);
        debug!(
            "scan finished: {} top-level fields, complete: {}",
            outcome.fields.len(),
            outcome.is_complete()
        );
        outcome
    }

    /// Scan `data`, which sits at `base` in the root buffer, at the given
    /// nesting depth.
    fn scan_at(&self, data: &[u8], base: usize, depth: usize) -> ScanOutcome {
        let mut fields = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            match self.read_field(data, base, pos, depth) {
                Ok(node) => {
                    pos += node.span.len;
                    fields.push(node);
                }
                Err(e) => {
                    trace!("scan aborted at offset {}: {}", base + pos, e);
                    return ScanOutcome {
                        fields,
                        error: Some(e),
                    };
                }
            }
        }

        ScanOutcome {
            fields,
            error: None,
        }
    }

    /// Read one complete field starting at `pos`.
    fn read_field(&self, data: &[u8], base: usize, pos: usize, depth: usize) -> Result<FieldNode> {
        let abs = base + pos;
        let tag = decode_tag(&data[pos..], abs)?;

        if tag.wire_type.is_group() {
            // Deprecated and unsupported
            return Err(Error::unsupported_wire_type(abs, tag.wire_type as u8));
        }

        let value_start = pos + tag.len;
        let remaining = &data[value_start..];

        let (payload, value_len) = match tag.wire_type {
            WireType::Varint => {
                let (value, len) = decode_varint(remaining, base + value_start)?;
                (FieldPayload::Varint(value), len)
            }
            WireType::I64 => {
                let bytes: [u8; 8] = remaining
                    .get(..8)
                    .ok_or_else(|| Error::truncated(base + value_start, 8, remaining.len()))?
                    .try_into()
                    .expect("slice length checked");
                (FieldPayload::Fixed64(u64::from_le_bytes(bytes)), 8)
            }
            WireType::I32 => {
                let bytes: [u8; 4] = remaining
                    .get(..4)
                    .ok_or_else(|| Error::truncated(base + value_start, 4, remaining.len()))?
                    .try_into()
                    .expect("slice length checked");
                (FieldPayload::Fixed32(u32::from_le_bytes(bytes)), 4)
            }
            WireType::Len => {
                let (declared, len_len) = decode_varint(remaining, base + value_start)?;
                let declared = declared as usize;
                let body = &remaining[len_len..];
                if body.len() < declared {
                    return Err(Error::truncated(
                        base + value_start + len_len,
                        declared,
                        body.len(),
                    ));
                }
                let slice = &body[..declared];
                let payload = self.classify(slice, base + value_start + len_len, depth);
                (FieldPayload::Len(payload), len_len + declared)
            }
            WireType::StartGroup | WireType::EndGroup => unreachable!("rejected above"),
        };

        Ok(FieldNode {
            number: tag.field_number,
            wire_type: tag.wire_type,
            payload,
            span: ByteSpan {
                offset: abs,
                len: tag.len + value_len,
            },
        })
    }

    /// Classify a length-delimited slice as text, nested message, or opaque.
    ///
    /// Text wins when the slice is valid UTF-8 and mostly printable. A
    /// non-printable slice is tried as a nested message and accepted only
    /// if the nested scan consumes the whole slice cleanly and produces at
    /// least one field. Everything else is opaque bytes.
    fn classify(&self, slice: &[u8], base: usize, depth: usize) -> LenPayload {
        if slice.is_empty() {
            return LenPayload::Opaque {
                len: 0,
                preview: String::new(),
            };
        }

        if let Ok(text) = std::str::from_utf8(slice) {
            if printable_ratio(text) > PRINTABLE_THRESHOLD {
                return LenPayload::Text(text.to_string());
            }
        }

        if depth < self.max_depth {
            let nested = self.scan_at(slice, base, depth + 1);
            if nested.is_complete() && !nested.fields.is_empty() {
                trace!(
                    "accepted nested interpretation at offset {} ({} fields)",
                    base,
                    nested.fields.len()
                );
                return LenPayload::Message(nested.fields);
            }
        }

        LenPayload::Opaque {
            len: slice.len(),
            preview: hex_preview(slice),
        }
    }
}

/// Scan a buffer with a default scanner
pub fn scan(data: &[u8]) -> ScanOutcome {
    WireScanner::new().scan(data)
}

/// Fraction of characters in `text` that are printable.
///
/// Counts all non-control characters plus tab, newline, and carriage
/// return.
pub fn printable_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut printable = 0usize;
    for c in text.chars() {
        total += 1;
        if !c.is_control() || matches!(c, '\n' | '\r' | '\t') {
            printable += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    printable as f64 / total as f64
}

/// Hex rendering of the first [`HEX_PREVIEW_BYTES`] bytes of a slice
pub fn hex_preview(slice: &[u8]) -> String {
    let mut out = String::with_capacity(HEX_PREVIEW_BYTES * 2);
    for byte in slice.iter().take(HEX_PREVIEW_BYTES) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
