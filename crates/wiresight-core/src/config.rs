//! Persisted configuration records.
//!
//! Plain serializable records owned by this core and read/written by the
//! surrounding application: descriptors, mapping tables, and column
//! bindings, each tied to its owning (table, column-group) context. JSON
//! via serde is the interchange form; schema bytes travel base64-encoded.

use crate::binding::ColumnBinding;
use crate::catalog::Descriptor;
use crate::error::Result;
use crate::mapping::{MappingRow, MappingTable};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Persisted form of a loaded descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    /// User-supplied display name, unique per owning table
    pub name: String,
    /// The owning table's identity
    pub table: String,
    /// The owning column group
    pub column_group: String,
    /// Fully-qualified message type names at upload time
    pub message_type_names: Vec<String>,
    /// The compiled descriptor-set bytes, base64 in JSON
    #[serde(with = "base64_bytes")]
    pub schema_data: Vec<u8>,
    /// Upload time as milliseconds since the Unix epoch
    pub uploaded_at_ms: u64,
}

impl DescriptorRecord {
    /// Snapshot a loaded descriptor into its persisted form
    pub fn from_descriptor(
        descriptor: &Descriptor,
        table: impl Into<String>,
        column_group: impl Into<String>,
    ) -> Self {
        Self {
            name: descriptor.name().to_string(),
            table: table.into(),
            column_group: column_group.into(),
            message_type_names: descriptor.message_type_names().to_vec(),
            schema_data: descriptor.schema_data().to_vec(),
            uploaded_at_ms: epoch_ms(descriptor.uploaded_at()),
        }
    }

    /// Reload the record into a live descriptor.
    ///
    /// The type-name index is rebuilt from the schema bytes; the stored
    /// `message_type_names` are a display snapshot only.
    pub fn load(&self) -> Result<Descriptor> {
        Descriptor::load(self.schema_data.clone(), self.name.clone())
    }
}

/// Persisted form of a mapping table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTableRecord {
    /// The table's display name
    pub name: String,
    /// The owning table's identity
    pub table: String,
    /// The owning column group
    pub column_group: String,
    /// Retained column names, in header order
    pub column_names: Vec<String>,
    /// The parsed data rows
    pub rows: Vec<MappingRow>,
    /// Selected key column, once configured
    pub key_column: Option<String>,
    /// Selected value column, once configured
    pub value_column: Option<String>,
    /// Selected host-table source column, once configured
    pub source_column: Option<String>,
}

impl MappingTableRecord {
    /// Snapshot a mapping table into its persisted form
    pub fn from_table(
        mapping: &MappingTable,
        table: impl Into<String>,
        column_group: impl Into<String>,
    ) -> Self {
        Self {
            name: mapping.name().to_string(),
            table: table.into(),
            column_group: column_group.into(),
            column_names: mapping.column_names().to_vec(),
            rows: mapping.rows().to_vec(),
            key_column: mapping.key_column().map(str::to_string),
            value_column: mapping.value_column().map(str::to_string),
            source_column: mapping.source_column().map(str::to_string),
        }
    }
}

/// The full persisted state: three collections
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// All uploaded descriptors
    pub descriptors: Vec<DescriptorRecord>,
    /// All uploaded mapping tables
    pub mapping_tables: Vec<MappingTableRecord>,
    /// All column bindings
    pub bindings: Vec<ColumnBinding>,
}

fn epoch_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
