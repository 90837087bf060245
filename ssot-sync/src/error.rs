//! Error types for the sync layer.
//!
//! Load-time errors ([`LoadError`], wrapped in [`SyncError::LoadFailed`])
//! abort a run. Apply-time errors ([`ApplyError`]) are isolated per record
//! and only surface in the report.

use serde::{Deserialize, Serialize};
use ssot_model::ModelError;
use ssot_storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for a single CRUD operation against a target.
pub type ApplyResult<T> = Result<T, ApplyError>;

/// Which adapter of a run an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Either snapshot could not be loaded; nothing was applied.
    #[error("failed to load {side} snapshot from `{adapter}`: {source}")]
    LoadFailed {
        side: Side,
        adapter: String,
        #[source]
        source: LoadError,
    },

    /// Record type selection or declaration error.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Invalid configuration or adapter wiring.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors raised while an adapter builds its snapshot.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Malformed record or duplicate identity.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Local store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Remote system failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A blocking load task panicked or was cancelled.
    #[error("load task failed: {0}")]
    Task(String),
}

/// Errors from the remote HTTP system.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Non-success HTTP status.
    #[error("HTTP {status} from {method} {url}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Connection, TLS or timeout failure.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not what the API contract promises.
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The client's request permits were closed.
    #[error("HTTP client closed")]
    Closed,
}

impl RemoteError {
    /// Timeouts, throttling, unavailable upstreams and connection failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                matches!(status, 408 | 425 | 429) || (500..600).contains(status)
            }
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Decode { .. } | Self::Closed => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Why a permanent apply failure will not succeed on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermanentKind {
    Validation,
    NotFound,
    Unauthorized,
    Conflict,
    Unsupported,
    MissingHandle,
    Decode,
    Other,
}

impl fmt::Display for PermanentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::NotFound => "not found",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::MissingHandle => "missing handle",
            Self::Decode => "decode",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Failure of one create, update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ApplyError {
    /// Retryable: service unavailable, timeout, rate limited.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// Not retryable: validation rejected, not found, unauthorized.
    #[error("permanent failure ({kind}): {message}")]
    Permanent { kind: PermanentKind, message: String },

    /// A transient failure that outlived the retry budget.
    #[error("gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: String },
}

impl ApplyError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn permanent(kind: PermanentKind, message: impl Into<String>) -> Self {
        Self::Permanent {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<RemoteError> for ApplyError {
    fn from(err: RemoteError) -> Self {
        if err.is_transient() {
            return Self::transient(err.to_string());
        }
        let kind = match &err {
            RemoteError::Status { status, .. } => match status {
                400 | 422 => PermanentKind::Validation,
                401 | 403 => PermanentKind::Unauthorized,
                404 | 410 => PermanentKind::NotFound,
                409 => PermanentKind::Conflict,
                _ => PermanentKind::Other,
            },
            RemoteError::Decode { .. } => PermanentKind::Decode,
            RemoteError::Transport { .. } | RemoteError::Closed => PermanentKind::Other,
        };
        Self::permanent(kind, err.to_string())
    }
}

impl From<StorageError> for ApplyError {
    fn from(err: StorageError) -> Self {
        if err.is_busy() {
            return Self::transient(err.to_string());
        }
        let kind = match &err {
            StorageError::NotFound { .. } => PermanentKind::NotFound,
            StorageError::UnresolvedReference { .. } | StorageError::UnboundField { .. } => {
                PermanentKind::Validation
            }
            _ if err.is_constraint() => PermanentKind::Validation,
            StorageError::UnknownRecordType(_) => PermanentKind::Unsupported,
            _ => PermanentKind::Other,
        };
        Self::permanent(kind, err.to_string())
    }
}
