//! # wiresight-core
//!
//! A library for decoding Protocol-Buffer-encoded blobs stored as opaque
//! columns inside an inspected database, with or without a schema.
//!
//! This crate provides the core functionality for:
//! - Scanning raw wire bytes into a generic field tree with no schema
//! - Loading compiled descriptor sets and indexing their message types
//! - Decoding bytes against a named message type into a canonical value tree
//! - Inferring which message type best explains an unlabeled blob
//! - Resolving discriminator values to types through CSV mapping tables
//!
//! ## Architecture
//!
//! The library is organized into several modules, leaves first:
//!
//! - [`scanner`]: schema-less wire format scanning
//! - [`catalog`]: descriptor-set loading and the descriptor cache
//! - [`decode`]: schema-aware decoding and value normalization
//! - [`infer`]: heuristic type inference
//! - [`mapping`]: CSV mapping tables and type-name matching
//! - [`binding`]: column bindings and the per-cell resolution chain
//! - [`config`]: persisted configuration records
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use wiresight_core::{ColumnBindingResolver, Descriptor, RowValues};
//! use std::fs;
//!
//! // Load a compiled descriptor set (protoc --descriptor_set_out)
//! let schema_bytes = fs::read("./schemas.pb")?;
//! let descriptor = Descriptor::load(schema_bytes, "schemas")?;
//!
//! // Decode a blob column cell: mapping, then inference, then wire scan
//! let blob = fs::read("./cell.bin")?;
//! let resolver = ColumnBindingResolver::new();
//! let outcome = resolver.resolve(None, Some(&descriptor), &RowValues::new(), &blob);
//! println!("{}", serde_json::to_string_pretty(&outcome)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod binding;
pub mod catalog;
pub mod config;
pub mod decode;
pub mod error;
pub mod infer;
pub mod mapping;
pub mod scanner;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export primary types for convenience
pub use binding::{ColumnBinding, ColumnBindingResolver, DecodeOutcome, DecodeSource, RowValues};
pub use catalog::{Descriptor, DescriptorCache};
pub use config::{DescriptorRecord, MappingTableRecord, WorkspaceConfig};
pub use decode::{DecodedMessage, DecodedValue};
pub use error::{Error, Result};
pub use infer::{InferenceMode, TypeInferenceEngine};
pub use mapping::{MappingRow, MappingTable};
pub use scanner::{FieldNode, FieldPayload, LenPayload, ScanOutcome, WireScanner, WireType};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
