//! Error types for the sync client.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to a gateway.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The gateway answered with a non-success status.
    #[error("gateway returned {status}: {error}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error code from the body, or the status reason.
        error: String,
        /// Detail message, if the gateway sent one.
        message: Option<String>,
    },

    /// A response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The client could not be constructed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Timeout => true,
            ClientError::Status { status, .. } => *status == 429 || *status >= 500,
            ClientError::InvalidResponse(_) | ClientError::InvalidConfig(_) => false,
        }
    }

    /// Returns the HTTP status, if the gateway answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_builder() {
            ClientError::InvalidConfig(err.to_string())
        } else if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ClientError::transport_retryable(err.to_string())
        } else {
            ClientError::transport_fatal(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ClientError {
        ClientError::Status {
            status: code,
            error: "x".into(),
            message: None,
        }
    }

    #[test]
    fn retryable_errors() {
        assert!(ClientError::transport_retryable("connection reset").is_retryable());
        assert!(!ClientError::transport_fatal("bad certificate").is_retryable());
        assert!(ClientError::Timeout.is_retryable());
        assert!(status(429).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
    }

    #[test]
    fn client_errors_are_not_retried() {
        for code in [400, 401, 403, 405, 413] {
            assert!(!status(code).is_retryable(), "{code}");
        }
        assert!(!ClientError::InvalidResponse("eof".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = ClientError::Status {
            status: 403,
            error: "purge_denied".into(),
            message: None,
        };
        assert_eq!(err.to_string(), "gateway returned 403: purge_denied");
        assert_eq!(err.status(), Some(403));
        assert_eq!(ClientError::Timeout.status(), None);
    }
}
