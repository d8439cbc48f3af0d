//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during storage operations.
///
/// A missing object is not an error: reads return `None` or an empty result.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from a cloud or in-memory object store.
    #[error("backend error: {0}")]
    Backend(#[from] object_store::Error),

    /// The storage URI could not be understood.
    #[error("invalid storage URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// A key or path component would escape the storage root.
    #[error("invalid path {0:?}")]
    InvalidPath(String),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object already exists where a create-only write was requested.
    #[error("already exists: {0}")]
    AlreadyExists(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
