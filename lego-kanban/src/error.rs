//! Error types for the partitioned item store

use lego_common::{ErrorSeverity, Severity};
use thiserror::Error;

/// Result type for store and adapter operations
pub type Result<T> = std::result::Result<T, KanbanError>;

/// Errors that can occur in store construction and persistence
#[derive(Debug, Error)]
pub enum KanbanError {
    /// Store constructed without any columns
    #[error("a board needs at least one column")]
    NoColumns,

    /// The same column id was configured twice
    #[error("duplicate column id: {id}")]
    DuplicateColumn { id: String },

    /// Column id not among the configured columns
    #[error("column not found: {id}")]
    UnknownColumn { id: String },

    /// Item not found in persisted data
    #[error("item not found: {id}")]
    ItemNotFound { id: String },

    /// Adapter does not implement an optional operation
    #[error("persistence adapter does not support {operation}")]
    Unsupported { operation: &'static str },

    /// Remote endpoint answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Request could not be sent or the response body could not be read
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Adapter base URL is unusable
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Configured header name or value is not valid HTTP
    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    /// Stored blob exists but does not decode
    #[error("stored data under '{key}' is corrupt: {message}")]
    CorruptData { key: String, message: String },

    /// Blob storage refused the read or write (quota, permissions, I/O)
    #[error("storage unavailable for '{key}': {source}")]
    StorageUnavailable {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by a caller-supplied adapter
    #[error("adapter error: {message}")]
    Adapter { message: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KanbanError {
    /// Create an unsupported-operation error
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Create an adapter error from any message
    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter {
            message: message.into(),
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an unknown column error from any debuggable column key
    pub fn unknown_column(id: &impl std::fmt::Debug) -> Self {
        Self::UnknownColumn {
            id: format!("{:?}", id),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Request(err) => err.is_timeout() || err.is_connect(),
            Self::StorageUnavailable { .. } => true,
            _ => false,
        }
    }
}

impl Severity for KanbanError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NoColumns
            | Self::DuplicateColumn { .. }
            | Self::UnknownColumn { .. }
            | Self::InvalidUrl { .. }
            | Self::InvalidHeader { .. } => ErrorSeverity::Critical,
            Self::CorruptData { .. } | Self::StorageUnavailable { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}
