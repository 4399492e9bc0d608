//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored entry could not be decoded.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// An entry could not be encoded for writing.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
