//! Error types for Bucket Chat.

use bucket_chat_core::{CoreError, SchemaError};
use bucket_chat_store::StoreError;
use thiserror::Error;

/// Errors that can occur during chat operations.
///
/// Signature and chain failures are not errors: they are findings in a
/// [`VerificationReport`](crate::VerificationReport).
#[derive(Debug, Error)]
pub enum ChatError {
    /// A record failed model validation.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Key or encoding error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
