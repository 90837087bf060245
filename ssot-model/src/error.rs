//! Error types for the record model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while declaring record types or building records and snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A record type declaration is invalid.
    #[error("invalid record type `{record_type}`: {reason}")]
    Schema { record_type: String, reason: String },

    /// A declared field could not be resolved from raw input.
    #[error("malformed {record_type} record: field `{field}` {reason}")]
    MalformedRecord {
        record_type: String,
        field: String,
        reason: String,
    },

    /// Two records of the same type share an identity key within one snapshot.
    #[error("duplicate {record_type} identity in snapshot `{snapshot}`: {key}")]
    DuplicateIdentity {
        record_type: String,
        snapshot: String,
        key: String,
    },

    /// The record type is not registered.
    #[error("unknown record type: {0}")]
    UnknownRecordType(String),

    /// The field is not declared on the record type.
    #[error("record type `{record_type}` has no field `{field}`")]
    UnknownField { record_type: String, field: String },
}

impl ModelError {
    pub(crate) fn schema(record_type: &str, reason: impl Into<String>) -> Self {
        Self::Schema {
            record_type: record_type.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(record_type: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            record_type: record_type.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors that make a loaded snapshot untrustworthy.
    pub fn is_load_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. } | Self::DuplicateIdentity { .. }
        )
    }
}
