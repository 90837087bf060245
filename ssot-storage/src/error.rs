//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No row with the given key.
    #[error("{record_type} row {key} not found")]
    NotFound { record_type: String, key: i64 },

    /// A foreign natural key does not name any referenced row.
    #[error("{record_type}.{field}: no referenced row named {value}")]
    UnresolvedReference {
        record_type: String,
        field: String,
        value: String,
    },

    /// A value was supplied for a field that has no column.
    #[error("{record_type}.{field} is not bound to a column")]
    UnboundField { record_type: String, field: String },

    /// No binding registered for the record type.
    #[error("no table binding for record type: {0}")]
    UnknownRecordType(String),

    /// The binding itself is unusable.
    #[error("invalid table binding: {0}")]
    InvalidBinding(String),

    /// A stored value cannot be represented as a field value.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("connection lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Busy or locked database: worth retrying.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }

    /// UNIQUE / FOREIGN KEY / NOT NULL violations.
    pub fn is_constraint(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
