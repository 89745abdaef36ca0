//! Error types for the wiresight-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for different failure modes.

use thiserror::Error;

/// Result type alias for wiresight operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all wiresight operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A varint exceeded the 10-byte maximum encoding length
    #[error("malformed varint at offset {offset}: continuation past 10 bytes")]
    MalformedVarint {
        /// Byte offset where the varint started
        offset: usize,
    },

    /// A declared length or fixed-width value runs past the end of the buffer
    #[error("truncated buffer at offset {offset}: need {needed} bytes, have {available}")]
    TruncatedBuffer {
        /// Byte offset where the error occurred
        offset: usize,
        /// Number of bytes required
        needed: usize,
        /// Number of bytes remaining
        available: usize,
    },

    /// A group wire type (deprecated) or reserved wire type was encountered
    #[error("unsupported wire type {wire_type} at offset {offset}")]
    UnsupportedWireType {
        /// Byte offset of the field tag
        offset: usize,
        /// The raw wire type bits
        wire_type: u8,
    },

    /// Invalid field number in a wire-format tag
    #[error("invalid field number {number} at offset {offset}: must be between 1 and {max}", max = crate::MAX_FIELD_NUMBER)]
    InvalidFieldNumber {
        /// Byte offset of the field tag
        offset: usize,
        /// The invalid field number
        number: u32,
    },

    /// Schema bytes did not parse as a valid compiled descriptor set
    #[error("failed to load descriptor set '{name}': {reason}")]
    DescriptorLoad {
        /// Display name of the descriptor being loaded
        name: String,
        /// Detailed description of the failure
        reason: String,
    },

    /// A requested message type name is absent from the descriptor
    #[error("message type '{type_name}' not found in descriptor")]
    TypeNotFound {
        /// The fully-qualified type name that was requested
        type_name: String,
    },

    /// No candidate type in the descriptor passed inference validation
    #[error("no message type in descriptor '{descriptor}' matches the input bytes")]
    NoInferenceMatch {
        /// Name of the descriptor whose candidates were exhausted
        descriptor: String,
    },

    /// A referenced column is absent from a mapping table or row
    #[error("column '{column}' not found")]
    ColumnNotFound {
        /// The missing column name
        column: String,
    },

    /// Failed to decode bytes against a message schema
    #[error("failed to decode message: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Failed to parse mapping-table CSV text
    #[error("failed to parse mapping table: {0}")]
    MappingParse(#[from] csv::Error),
}

impl Error {
    /// Creates a new malformed varint error
    pub fn malformed_varint(offset: usize) -> Self {
        Self::MalformedVarint { offset }
    }

    /// Creates a new truncated buffer error
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        Self::TruncatedBuffer {
            offset,
            needed,
            available,
        }
    }

    /// Creates a new unsupported wire type error
    pub fn unsupported_wire_type(offset: usize, wire_type: u8) -> Self {
        Self::UnsupportedWireType { offset, wire_type }
    }

    /// Creates a new invalid field number error
    pub fn invalid_field_number(offset: usize, number: u32) -> Self {
        Self::InvalidFieldNumber { offset, number }
    }

    /// Creates a new descriptor load error
    pub fn descriptor_load(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DescriptorLoad {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new type-not-found error
    pub fn type_not_found(type_name: impl Into<String>) -> Self {
        Self::TypeNotFound {
            type_name: type_name.into(),
        }
    }

    /// Creates a new no-inference-match error
    pub fn no_inference_match(descriptor: impl Into<String>) -> Self {
        Self::NoInferenceMatch {
            descriptor: descriptor.into(),
        }
    }

    /// Creates a new column-not-found error
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    /// Returns true if this error came from scanning raw wire bytes.
    ///
    /// Wire errors are partial-success tolerant: the scanner returns them
    /// alongside whatever fields it accumulated before the failure.
    pub fn is_wire_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedVarint { .. }
                | Self::TruncatedBuffer { .. }
                | Self::UnsupportedWireType { .. }
                | Self::InvalidFieldNumber { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::truncated(4, 8, 3);
        assert!(err.to_string().contains("offset 4"));
        assert!(err.to_string().contains("need 8"));

        let err = Error::type_not_found("com.example.Missing");
        assert!(err.to_string().contains("com.example.Missing"));
    }

    #[test]
    fn test_is_wire_error() {
        assert!(Error::malformed_varint(0).is_wire_error());
        assert!(Error::unsupported_wire_type(2, 3).is_wire_error());
        assert!(!Error::type_not_found("x").is_wire_error());
    }
}
