//! Mapping tables: CSV-backed discriminator-value-to-type-name lookup.
//!
//! A mapping table is a tabular dataset pairing discriminator values
//! found in a database column with message type labels. Labels are
//! fuzzy-matched against a descriptor's type names so a row value like
//! `MsgText` can select `com.example.MsgText` without brute-force
//! inference.
//!
//! Parsing goes through the `csv` crate (RFC4180 quoting, escaped
//! embedded quotes, commas inside quotes). Blank column headers are
//! dropped together with their values; rows that are blank across all
//! retained columns are skipped.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

/// One data row: retained column name to raw string value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingRow {
    /// Raw cell values by column name
    pub columns: HashMap<String, String>,
}

impl MappingRow {
    /// Returns the raw value of a column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

/// A parsed mapping table.
///
/// Before [`configure`](Self::configure) is called the table is usable
/// only for preview; key/value/source column selection is what makes it
/// participate in decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTable {
    name: String,
    column_names: Vec<String>,
    rows: Vec<MappingRow>,
    key_column: Option<String>,
    value_column: Option<String>,
    source_column: Option<String>,
}

impl MappingTable {
    /// Parse CSV text with a header row into an unconfigured table.
    pub fn parse(csv_text: &str, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_text.as_bytes());

        // Retain only columns with a non-blank header
        let headers = reader.headers()?.clone();
        let retained: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.trim().is_empty())
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut columns = HashMap::new();
            let mut all_blank = true;
            for (index, column) in &retained {
                let value = record.get(*index).unwrap_or("").to_string();
                if !value.trim().is_empty() {
                    all_blank = false;
                }
                columns.insert(column.clone(), value);
            }
            if all_blank {
                continue;
            }
            rows.push(MappingRow { columns });
        }

        debug!(
            "parsed mapping table '{}': {} columns, {} rows",
            name,
            retained.len(),
            rows.len()
        );

        Ok(Self {
            name,
            column_names: retained.into_iter().map(|(_, h)| h).collect(),
            rows,
            key_column: None,
            value_column: None,
            source_column: None,
        })
    }

    /// Configure the table with its key, value, and host-table source
    /// columns. Pure: returns a new configured value.
    ///
    /// The key and value columns must exist among the retained columns;
    /// the source column names a column of the *host* table and is not
    /// validated here.
    pub fn configure(
        mut self,
        key_column: &str,
        value_column: &str,
        source_column: &str,
    ) -> Result<Self> {
        for column in [key_column, value_column] {
            if !self.column_names.iter().any(|c| c == column) {
                return Err(Error::column_not_found(column));
            }
        }
        self.key_column = Some(key_column.to_string());
        self.value_column = Some(value_column.to_string());
        self.source_column = Some(source_column.to_string());
        Ok(self)
    }

    /// Returns true once key/value/source columns are selected
    pub fn is_configured(&self) -> bool {
        self.key_column.is_some() && self.value_column.is_some() && self.source_column.is_some()
    }

    /// The table's display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retained column names, in header order
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// The parsed data rows
    pub fn rows(&self) -> &[MappingRow] {
        &self.rows
    }

    /// The selected key column, if configured
    pub fn key_column(&self) -> Option<&str> {
        self.key_column.as_deref()
    }

    /// The selected value column, if configured
    pub fn value_column(&self) -> Option<&str> {
        self.value_column.as_deref()
    }

    /// The selected host-table source column, if configured
    pub fn source_column(&self) -> Option<&str> {
        self.source_column.as_deref()
    }

    /// Resolve every row's key/value pair against the known type names.
    ///
    /// Rows whose value matches no type are silently excluded; partial
    /// mapping coverage is a normal state, not an error. Returns an
    /// empty list for an unconfigured table.
    pub fn resolved_mappings(&self, known_type_names: &[String]) -> Vec<(String, String)> {
        let (Some(key_column), Some(value_column)) = (&self.key_column, &self.value_column) else {
            return Vec::new();
        };

        let mut resolved = Vec::new();
        for row in &self.rows {
            let Some(key) = row.get(key_column) else {
                continue;
            };
            let Some(value) = row.get(value_column) else {
                continue;
            };
            match match_type_name(value.trim(), known_type_names) {
                Some(type_name) => {
                    resolved.push((key.trim().to_string(), type_name.to_string()));
                }
                None => {
                    trace!("mapping value '{}' matched no known type", value);
                }
            }
        }
        resolved
    }
}

/// The segment of a fully-qualified name after the last `.`
fn short_name(full_name: &str) -> &str {
    full_name.rsplit('.').next().unwrap_or(full_name)
}

/// Match a mapping value against known type names.
///
/// Stages, tried in order, first hit wins:
///
/// 1. exact equality with a full name;
/// 2. case-insensitive equality with a short name, only if exactly one
///    type bears that short name (ambiguity is no-match, never an
///    arbitrary pick);
/// 3. case-insensitive dotted-suffix match, for values that carry a
///    trailing part of the namespace.
pub fn match_type_name<'a>(value: &str, known_type_names: &'a [String]) -> Option<&'a str> {
    if value.is_empty() {
        return None;
    }

    if let Some(hit) = known_type_names.iter().find(|n| n.as_str() == value) {
        return Some(hit);
    }

    let lower = value.to_ascii_lowercase();
    let mut short_hits = known_type_names
        .iter()
        .filter(|n| short_name(n).to_ascii_lowercase() == lower);

    match (short_hits.next(), short_hits.next()) {
        (Some(only), None) => Some(only),
        (Some(_), Some(_)) => None, // ambiguous short name
        (None, _) => {
            let suffix = format!(".{lower}");
            known_type_names
                .iter()
                .find(|n| n.to_ascii_lowercase().ends_with(&suffix))
                .map(String::as_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn known() -> Vec<String> {
        vec![
            "com.example.MsgText".to_string(),
            "com.example.MsgCounter".to_string(),
            "org.other.MsgText".to_string(),
            "org.other.Unique".to_string(),
        ]
    }

    #[test]
    fn test_parse_basic() {
        let table = MappingTable::parse("msgType,typeName\n7,MsgText\n8,MsgCounter\n", "types")
            .unwrap();
        assert_eq!(table.name(), "types");
        assert_eq!(table.column_names(), &["msgType", "typeName"]);
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0].get("msgType"), Some("7"));
        assert_eq!(table.rows()[1].get("typeName"), Some("MsgCounter"));
        assert!(!table.is_configured());
    }

    #[test]
    fn test_parse_quoted_fields() {
        let csv = "id,label\n1,\"with, comma\"\n2,\"embedded \"\"quotes\"\"\"\n";
        let table = MappingTable::parse(csv, "t").unwrap();
        assert_eq!(table.rows()[0].get("label"), Some("with, comma"));
        assert_eq!(table.rows()[1].get("label"), Some("embedded \"quotes\""));
    }

    #[test]
    fn test_parse_drops_blank_headers() {
        let csv = "id,,label\n1,junk,alpha\n2,junk,beta\n";
        let table = MappingTable::parse(csv, "t").unwrap();
        assert_eq!(table.column_names(), &["id", "label"]);
        assert_eq!(table.rows()[0].get("label"), Some("alpha"));
        // The unnamed column's values are gone entirely
        assert_eq!(table.rows()[0].columns.len(), 2);
    }

    #[test]
    fn test_parse_skips_blank_rows() {
        let csv = "id,label\n1,alpha\n,\n2,beta\n";
        let table = MappingTable::parse(csv, "t").unwrap();
        assert_eq!(table.rows().len(), 2);
    }

    #[test]
    fn test_configure_validates_columns() {
        let table = MappingTable::parse("a,b\n1,2\n", "t").unwrap();
        let err = table
            .clone()
            .configure("a", "missing", "host.col")
            .unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));

        let configured = table.configure("a", "b", "host.col").unwrap();
        assert!(configured.is_configured());
        assert_eq!(configured.source_column(), Some("host.col"));
    }

    #[test]
    fn test_match_exact_full_name() {
        let known = known();
        assert_eq!(
            match_type_name("com.example.MsgText", &known),
            Some("com.example.MsgText")
        );
    }

    #[test]
    fn test_match_unique_short_name_case_insensitive() {
        let known = known();
        assert_eq!(
            match_type_name("msgcounter", &known),
            Some("com.example.MsgCounter")
        );
        assert_eq!(match_type_name("UNIQUE", &known), Some("org.other.Unique"));
    }

    #[test]
    fn test_match_ambiguous_short_name_is_no_match() {
        // Two catalog types share the short name MsgText
        assert_eq!(match_type_name("MsgText", &known()), None);
    }

    #[test]
    fn test_match_dotted_suffix_disambiguates() {
        let known = known();
        assert_eq!(
            match_type_name("other.MsgText", &known),
            Some("org.other.MsgText")
        );
        assert_eq!(
            match_type_name("example.msgtext", &known),
            Some("com.example.MsgText")
        );
    }

    #[test]
    fn test_match_miss() {
        assert_eq!(match_type_name("Nothing", &known()), None);
        assert_eq!(match_type_name("", &known()), None);
    }

    #[test]
    fn test_resolved_mappings_excludes_unmatched() {
        let table = MappingTable::parse(
            "msgType,typeName\n7,MsgCounter\n8,NoSuchType\n9,org.other.Unique\n",
            "types",
        )
        .unwrap()
        .configure("msgType", "typeName", "db.msg_type")
        .unwrap();

        let resolved = table.resolved_mappings(&known());
        assert_eq!(
            resolved,
            vec![
                ("7".to_string(), "com.example.MsgCounter".to_string()),
                ("9".to_string(), "org.other.Unique".to_string()),
            ]
        );
    }

    #[test]
    fn test_resolved_mappings_unconfigured_is_empty() {
        let table = MappingTable::parse("a,b\n1,2\n", "t").unwrap();
        assert!(table.resolved_mappings(&known()).is_empty());
    }
}
