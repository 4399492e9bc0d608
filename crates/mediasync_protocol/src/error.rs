//! Error types for protocol parsing.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding request bodies.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The body is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The body parsed, but is not a JSON object.
    #[error("invalid body: expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl ProtocolError {
    /// Returns the short error code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::InvalidJson(_) => crate::error_codes::INVALID_JSON,
            ProtocolError::NotAnObject(_) => crate::error_codes::INVALID_BODY,
        }
    }
}
