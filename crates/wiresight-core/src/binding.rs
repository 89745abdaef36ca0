//! Column bindings and the per-cell decode resolution chain.
//!
//! A [`ColumnBinding`] associates a data column of an inspected table
//! with a descriptor and, optionally, a configured mapping table plus
//! the host-table column carrying the discriminator value. The
//! [`ColumnBindingResolver`] is the entry point for "decode this cell":
//! it tries a fixed order of strategies and stops at the first success.
//!
//! 1. **Mapping** — the row's discriminator value selects a concrete
//!    type through the binding's resolved mappings. A decode failure
//!    here is surfaced, not masked: a configured mapping that fails to
//!    decode indicates a configuration or data error that should be
//!    visible rather than silently degrading to a worse result.
//! 2. **Inference** — try every type in the bound descriptor.
//! 3. **Wire scan** — schema-less structural view, which succeeds on
//!    nearly any non-empty buffer.
//!
//! "We could not even wire-scan it" is reported as [`DecodeOutcome::Failed`],
//! distinct from "we decoded it and it is opaque binary".

use crate::catalog::Descriptor;
use crate::decode::{self, DecodedMessage};
use crate::infer::TypeInferenceEngine;
use crate::mapping::MappingTable;
use crate::scanner::{FieldNode, WireScanner};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Row values from the host table: column name to display string
pub type RowValues = HashMap<String, String>;

/// Association between a data column and its decode configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBinding {
    /// The inspected table's identity
    pub table: String,
    /// The bound blob column
    pub column: String,
    /// Name of the descriptor to decode with
    pub descriptor_name: String,
    /// Name of the bound mapping table, if any
    pub mapping_table_name: Option<String>,
    /// Host-table column carrying the discriminator value, if any
    pub type_source_column: Option<String>,
    /// Derived (discriminator value, message type full name) pairs.
    ///
    /// Recomputed whenever the mapping table is (re)configured or the
    /// descriptor's type list changes; never edited directly. Entries
    /// may go stale against a re-uploaded descriptor — they are
    /// revalidated at decode time.
    pub resolved_type_mappings: Vec<(String, String)>,
}

impl ColumnBinding {
    /// Creates a binding with no mapping table
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        descriptor_name: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            descriptor_name: descriptor_name.into(),
            mapping_table_name: None,
            type_source_column: None,
            resolved_type_mappings: Vec::new(),
        }
    }

    /// Attach a configured mapping table, recomputing the resolved
    /// type mappings against the descriptor's current type list.
    pub fn with_mapping(mut self, mapping: &MappingTable, descriptor: &Descriptor) -> Self {
        self.mapping_table_name = Some(mapping.name().to_string());
        self.type_source_column = mapping.source_column().map(str::to_string);
        self.resolved_type_mappings = mapping.resolved_mappings(descriptor.message_type_names());
        self
    }

    /// Look up the mapped type for a raw discriminator value.
    ///
    /// Two passes: exact string match, then a normalized match with
    /// underscores stripped from both sides ("1000" vs "1_000").
    pub fn mapped_type_for(&self, raw_value: &str) -> Option<&str> {
        if let Some((_, type_name)) = self
            .resolved_type_mappings
            .iter()
            .find(|(key, _)| key == raw_value)
        {
            return Some(type_name);
        }

        let normalized = strip_underscores(raw_value);
        self.resolved_type_mappings
            .iter()
            .find(|(key, _)| strip_underscores(key) == normalized)
            .map(|(_, type_name)| type_name.as_str())
    }
}

fn strip_underscores(value: &str) -> String {
    value.chars().filter(|c| *c != '_').collect()
}

/// Which strategy produced a decoded result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeSource {
    /// The binding's mapping table selected the type
    Mapping,
    /// The inference engine selected the type
    Inference,
}

/// Outcome of resolving one cell
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeOutcome {
    /// Decoded against a concrete message type
    Decoded {
        /// The fully-qualified type that decoded the blob
        type_name: String,
        /// Which strategy selected the type
        source: DecodeSource,
        /// The canonical value tree
        message: DecodedMessage,
    },
    /// No schema applied; best-effort structural view
    WireOnly {
        /// The scanned field tree
        fields: Vec<FieldNode>,
        /// Trailing scan error for damaged buffers, if any
        error: Option<String>,
    },
    /// Nothing worked, including the wire scan
    Failed {
        /// Human-readable reason
        reason: String,
    },
}

impl DecodeOutcome {
    /// Returns true for a schema-decoded outcome
    pub fn is_decoded(&self) -> bool {
        matches!(self, DecodeOutcome::Decoded { .. })
    }
}

/// Entry point for per-cell decode resolution
#[derive(Debug, Clone, Default)]
pub struct ColumnBindingResolver {
    engine: TypeInferenceEngine,
    scanner: WireScanner,
}

impl ColumnBindingResolver {
    /// Creates a resolver with default inference and scanning behavior
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with a custom inference engine
    pub fn with_engine(engine: TypeInferenceEngine) -> Self {
        Self {
            engine,
            scanner: WireScanner::new(),
        }
    }

    /// Resolve one cell: mapping, then inference, then wire scan.
    ///
    /// `binding` and `descriptor` are optional because a column may have
    /// no configuration at all; the wire scan still applies.
    pub fn resolve(
        &self,
        binding: Option<&ColumnBinding>,
        descriptor: Option<&Descriptor>,
        row: &RowValues,
        blob: &[u8],
    ) -> DecodeOutcome {
        if blob.is_empty() {
            return DecodeOutcome::Failed {
                reason: "empty buffer".to_string(),
            };
        }

        // Stage 1: configured mapping
        if let (Some(binding), Some(descriptor)) = (binding, descriptor) {
            if let Some(outcome) = self.try_mapping(binding, descriptor, row, blob) {
                return outcome;
            }
        }

        // Stage 2: inference across the descriptor's types
        if let Some(descriptor) = descriptor {
            if let Some(type_name) = self.engine.infer(descriptor, blob) {
                if let Some(schema) = descriptor.lookup(&type_name) {
                    if let Ok(message) = decode::decode(&schema, blob) {
                        debug!("cell decoded as {} via inference", type_name);
                        return DecodeOutcome::Decoded {
                            type_name,
                            source: DecodeSource::Inference,
                            message,
                        };
                    }
                }
            }
        }

        // Stage 3: schema-less wire scan
        let outcome = self.scanner.scan(blob);
        if outcome.fields.is_empty() {
            let reason = outcome
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no wire fields".to_string());
            debug!("cell is undecodable: {}", reason);
            return DecodeOutcome::Failed { reason };
        }
        DecodeOutcome::WireOnly {
            error: outcome.error.map(|e| e.to_string()),
            fields: outcome.fields,
        }
    }

    /// Resolve a cell whose blob arrives base64-encoded
    pub fn resolve_base64(
        &self,
        binding: Option<&ColumnBinding>,
        descriptor: Option<&Descriptor>,
        row: &RowValues,
        blob_b64: &str,
    ) -> DecodeOutcome {
        match BASE64.decode(blob_b64.trim()) {
            Ok(blob) => self.resolve(binding, descriptor, row, &blob),
            Err(e) => DecodeOutcome::Failed {
                reason: format!("invalid base64 payload: {e}"),
            },
        }
    }

    /// Stage 1. `None` means "no mapping applies, keep falling through";
    /// `Some` is a final outcome (success, or a surfaced mapping failure).
    fn try_mapping(
        &self,
        binding: &ColumnBinding,
        descriptor: &Descriptor,
        row: &RowValues,
        blob: &[u8],
    ) -> Option<DecodeOutcome> {
        let source_column = binding.type_source_column.as_deref()?;
        let raw_value = row.get(source_column)?;
        let type_name = binding.mapped_type_for(raw_value)?;

        // Revalidate against the live descriptor: the resolved mappings
        // are a snapshot and may reference types a re-uploaded schema no
        // longer has. A stale name falls through to inference.
        let Some(schema) = descriptor.lookup(type_name) else {
            trace!(
                "mapped type '{}' absent from descriptor '{}', falling through",
                type_name,
                descriptor.name()
            );
            return None;
        };

        match decode::decode(&schema, blob) {
            Ok(message) => {
                debug!("cell decoded as {} via mapping", type_name);
                Some(DecodeOutcome::Decoded {
                    type_name: type_name.to_string(),
                    source: DecodeSource::Mapping,
                    message,
                })
            }
            // A mapped type that fails to decode is a visible failure,
            // not a trigger for inference
            Err(e) => Some(DecodeOutcome::Failed {
                reason: format!("mapped type '{type_name}' failed to decode: {e}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Descriptor;
    use crate::decode::DecodedValue;
    use crate::testutil::descriptor_set_bytes;
    use pretty_assertions::assert_eq;

    fn load() -> Descriptor {
        Descriptor::load(descriptor_set_bytes(), "test").unwrap()
    }

    fn mapping_binding(descriptor: &Descriptor) -> ColumnBinding {
        let table = MappingTable::parse("msgType,typeName\n7,MsgText\n8,MsgAlpha\n", "types")
            .unwrap()
            .configure("msgType", "typeName", "db.msg_type")
            .unwrap();
        ColumnBinding::new("db.messages", "payload", "test").with_mapping(&table, descriptor)
    }

    fn row(column: &str, value: &str) -> RowValues {
        let mut row = RowValues::new();
        row.insert(column.to_string(), value.to_string());
        row
    }

    #[test]
    fn test_end_to_end_mapping_path() {
        let descriptor = load();
        let binding = mapping_binding(&descriptor);
        // MsgText is unambiguous in this catalog, so the short name resolves
        assert_eq!(
            binding.mapped_type_for("7"),
            Some("com.example.MsgText")
        );

        let resolver = ColumnBindingResolver::new();
        let outcome = resolver.resolve(
            Some(&binding),
            Some(&descriptor),
            &row("db.msg_type", "7"),
            b"\x0a\x05hello",
        );

        // The mapping path wins, not inference
        let DecodeOutcome::Decoded {
            type_name,
            source,
            message,
        } = outcome
        else {
            panic!("expected decoded outcome");
        };
        assert_eq!(type_name, "com.example.MsgText");
        assert_eq!(source, DecodeSource::Mapping);
        assert_eq!(
            message.get("text"),
            Some(&DecodedValue::Text("hello".to_string()))
        );
    }

    #[test]
    fn test_underscore_normalization_both_ways() {
        let descriptor = load();
        let table = MappingTable::parse("k,v\n1000,MsgText\n2_000,MsgAlpha\n", "types")
            .unwrap()
            .configure("k", "v", "db.kind")
            .unwrap();
        let binding =
            ColumnBinding::new("db.messages", "payload", "test").with_mapping(&table, &descriptor);

        assert_eq!(binding.mapped_type_for("1_000"), Some("com.example.MsgText"));
        assert_eq!(binding.mapped_type_for("2000"), Some("com.example.MsgAlpha"));
        assert_eq!(binding.mapped_type_for("3000"), None);
    }

    #[test]
    fn test_mapped_decode_failure_is_surfaced_not_masked() {
        let descriptor = load();
        let binding = mapping_binding(&descriptor);
        let resolver = ColumnBindingResolver::new();

        // Row selects MsgText but the blob is a bare varint field, which
        // MsgText cannot decode. Inference would happily call this
        // MsgAlpha; the resolver must fail loudly instead.
        let outcome = resolver.resolve(
            Some(&binding),
            Some(&descriptor),
            &row("db.msg_type", "7"),
            &[0x08, 0x01],
        );
        let DecodeOutcome::Failed { reason } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(reason.contains("com.example.MsgText"));
    }

    #[test]
    fn test_stale_mapping_falls_through_to_inference() {
        let descriptor = load();
        let mut binding = mapping_binding(&descriptor);
        // Simulate a snapshot that references a type the descriptor no
        // longer carries
        binding.resolved_type_mappings =
            vec![("7".to_string(), "com.example.Retired".to_string())];

        let resolver = ColumnBindingResolver::new();
        let outcome = resolver.resolve(
            Some(&binding),
            Some(&descriptor),
            &row("db.msg_type", "7"),
            &[0x08, 0x01],
        );
        let DecodeOutcome::Decoded { source, .. } = outcome else {
            panic!("expected inference fallback");
        };
        assert_eq!(source, DecodeSource::Inference);
    }

    #[test]
    fn test_no_mapping_value_falls_through_to_inference() {
        let descriptor = load();
        let binding = mapping_binding(&descriptor);
        let resolver = ColumnBindingResolver::new();

        // Row carries no discriminator column at all
        let outcome = resolver.resolve(
            Some(&binding),
            Some(&descriptor),
            &RowValues::new(),
            &[0x08, 0x96, 0x01],
        );
        let DecodeOutcome::Decoded {
            type_name, source, ..
        } = outcome
        else {
            panic!("expected inference fallback");
        };
        assert_eq!(source, DecodeSource::Inference);
        assert_eq!(type_name, "com.example.MsgAlpha");
    }

    #[test]
    fn test_no_descriptor_falls_back_to_wire_scan() {
        let resolver = ColumnBindingResolver::new();
        let outcome = resolver.resolve(None, None, &RowValues::new(), &[0x08, 0x96, 0x01]);
        let DecodeOutcome::WireOnly { fields, error } = outcome else {
            panic!("expected wire-only outcome");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].number, 1);
        assert!(error.is_none());
    }

    #[test]
    fn test_undecodable_is_distinct_from_wire_only() {
        let resolver = ColumnBindingResolver::new();

        // Empty buffer: nothing to show at all
        let outcome = resolver.resolve(None, None, &RowValues::new(), &[]);
        assert!(matches!(outcome, DecodeOutcome::Failed { .. }));

        // A buffer that fails before the first field: also undecodable
        let outcome = resolver.resolve(None, None, &RowValues::new(), &[0x00]);
        assert!(matches!(outcome, DecodeOutcome::Failed { .. }));

        // A buffer that damages mid-stream still shows what it can
        let outcome = resolver.resolve(None, None, &RowValues::new(), &[0x08, 0x01, 0x0B]);
        let DecodeOutcome::WireOnly { fields, error } = outcome else {
            panic!("expected wire-only outcome");
        };
        assert_eq!(fields.len(), 1);
        assert!(error.unwrap().contains("unsupported wire type"));
    }

    #[test]
    fn test_resolve_base64() {
        let resolver = ColumnBindingResolver::new();
        // [0x08, 0x01] base64-encoded
        let outcome = resolver.resolve_base64(None, None, &RowValues::new(), "CAE=");
        assert!(matches!(outcome, DecodeOutcome::WireOnly { .. }));

        let outcome = resolver.resolve_base64(None, None, &RowValues::new(), "!!!");
        let DecodeOutcome::Failed { reason } = outcome else {
            panic!("expected failure");
        };
        assert!(reason.contains("base64"));
    }
}
