//! Schema-aware decoding of message bytes into a canonical value tree.
//!
//! Decoding goes through `prost-reflect`'s dynamic messages: bytes are
//! decoded against a [`MessageDescriptor`] with standard protobuf
//! semantics (zig-zag sints, bools, enums, packed repeated scalars,
//! nested messages), then normalized into the closed [`DecodedValue`]
//! union so every consumer handles all shapes exhaustively.
//!
//! Byte-valued fields are classified: valid, mostly-printable UTF-8
//! renders as text, anything else as an explicit binary marker carrying
//! the byte count and a bounded hex preview.

use crate::error::Result;
use crate::scanner::{hex_preview, printable_ratio, PRINTABLE_THRESHOLD};
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MapKey, MessageDescriptor, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

/// A decoded message: field name to canonical value, sorted by name
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct DecodedMessage {
    /// The populated fields of the message
    pub fields: BTreeMap<String, DecodedValue>,
}

impl DecodedMessage {
    /// Returns the value of a field by name
    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        self.fields.get(name)
    }

    /// Number of populated fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field is populated
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Canonical decoded value.
///
/// A closed union: every consumer must handle all variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedValue {
    /// A boolean field
    Bool(bool),
    /// Any signed integer kind, widened to 64 bits
    Int(i64),
    /// Any unsigned integer kind, widened to 64 bits
    UInt(u64),
    /// Float or double
    Float(f64),
    /// A string field, or a bytes field that classified as text
    Text(String),
    /// An enum value, by name
    Enum(String),
    /// A bytes field that did not classify as text
    Binary {
        /// Total payload length in bytes
        #[serde(rename = "binary_len")]
        len: usize,
        /// Hex rendering of the leading bytes, bounded
        preview: String,
    },
    /// A nested message, or a map rendered by key
    Message(DecodedMessage),
    /// A repeated field
    List(Vec<DecodedValue>),
}

/// Decode bytes against a message schema into the canonical tree
pub fn decode(schema: &MessageDescriptor, data: &[u8]) -> Result<DecodedMessage> {
    let message = decode_dynamic(schema, data)?;
    Ok(from_dynamic(&message))
}

/// Decode bytes against a message schema, keeping the dynamic form.
///
/// The inference engine uses this entry point so it can re-encode the
/// decoded message for its length-ratio check.
pub fn decode_dynamic(schema: &MessageDescriptor, data: &[u8]) -> Result<DynamicMessage> {
    trace!(
        "decoding {} bytes as {}",
        data.len(),
        schema.full_name()
    );
    Ok(DynamicMessage::decode(schema.clone(), data)?)
}

/// Normalize a dynamic message into the canonical value tree
pub fn from_dynamic(message: &DynamicMessage) -> DecodedMessage {
    let mut fields = BTreeMap::new();
    for (field, value) in message.fields() {
        fields.insert(field.name().to_string(), convert_value(&field, value));
    }
    DecodedMessage { fields }
}

fn convert_value(field: &FieldDescriptor, value: &Value) -> DecodedValue {
    match value {
        Value::Bool(b) => DecodedValue::Bool(*b),
        Value::I32(v) => DecodedValue::Int(i64::from(*v)),
        Value::I64(v) => DecodedValue::Int(*v),
        Value::U32(v) => DecodedValue::UInt(u64::from(*v)),
        Value::U64(v) => DecodedValue::UInt(*v),
        Value::F32(v) => DecodedValue::Float(f64::from(*v)),
        Value::F64(v) => DecodedValue::Float(*v),
        Value::String(s) => DecodedValue::Text(s.clone()),
        Value::Bytes(b) => classify_bytes(b),
        Value::EnumNumber(n) => match field.kind() {
            Kind::Enum(e) => e
                .get_value(*n)
                .map(|v| DecodedValue::Enum(v.name().to_string()))
                // proto3 enums are open: unknown numbers stay numeric
                .unwrap_or(DecodedValue::Int(i64::from(*n))),
            _ => DecodedValue::Int(i64::from(*n)),
        },
        Value::Message(m) => DecodedValue::Message(from_dynamic(m)),
        Value::List(items) => DecodedValue::List(
            items
                .iter()
                .map(|item| convert_value(field, item))
                .collect(),
        ),
        Value::Map(entries) => {
            // Render maps as a message keyed by the map key's display form
            let value_field = match field.kind() {
                Kind::Message(entry) if entry.is_map_entry() => Some(entry.map_entry_value_field()),
                _ => None,
            };
            let mut fields = BTreeMap::new();
            for (key, item) in entries {
                let converted = match &value_field {
                    Some(vf) => convert_value(vf, item),
                    None => DecodedValue::Text(format!("{item:?}")),
                };
                fields.insert(map_key_display(key), converted);
            }
            DecodedValue::Message(DecodedMessage { fields })
        }
    }
}

fn map_key_display(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
        MapKey::String(s) => s.clone(),
    }
}

/// Classify a bytes payload as text or an explicit binary marker.
///
/// Shares the scanner's rule: strict UTF-8 plus a printable ratio above
/// the threshold renders as text, everything else as a bounded preview.
/// Unlike the scanner there is no nested-message attempt here; a schema
/// that declares `bytes` has already told us it is not a message.
pub fn classify_bytes(data: &[u8]) -> DecodedValue {
    if data.is_empty() {
        return DecodedValue::Binary {
            len: 0,
            preview: String::new(),
        };
    }
    if let Ok(text) = std::str::from_utf8(data) {
        if printable_ratio(text) > PRINTABLE_THRESHOLD {
            return DecodedValue::Text(text.to_string());
        }
    }
    DecodedValue::Binary {
        len: data.len(),
        preview: hex_preview(data),
    }
}
