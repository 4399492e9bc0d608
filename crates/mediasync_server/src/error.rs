//! Error types for the sync gateway.

use mediasync_protocol::{error_codes, ErrorBody, ProtocolError};
use mediasync_storage::StorageError;
use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur in the sync gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The presented secret did not authorize the operation.
    #[error("unauthorized")]
    Unauthorized,

    /// A purge targeted a key outside the allow-list.
    #[error("purge denied for key {key:?}")]
    PurgeDenied {
        /// The rejected key.
        key: String,
    },

    /// The raw body exceeded the configured limit.
    #[error("payload too large: limit is {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The body could not be decoded.
    #[error(transparent)]
    InvalidBody(#[from] ProtocolError),

    /// The HTTP method is not served.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// No store is bound to the gateway.
    #[error("store not configured")]
    StoreNotConfigured,

    /// The store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal failure, including panics and failed tasks.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error on the listener.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Unauthorized => 401,
            GatewayError::PurgeDenied { .. } => 403,
            GatewayError::PayloadTooLarge { .. } => 413,
            GatewayError::InvalidBody(_) => 400,
            GatewayError::MethodNotAllowed(_) => 405,
            GatewayError::StoreNotConfigured
            | GatewayError::Storage(_)
            | GatewayError::InvalidConfig(_)
            | GatewayError::Internal(_)
            | GatewayError::Io(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Builds the JSON body sent to the caller.
    ///
    /// Only unexpected failures carry a detail message.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            GatewayError::Unauthorized => ErrorBody::new(error_codes::UNAUTHORIZED),
            GatewayError::PurgeDenied { .. } => ErrorBody::new(error_codes::PURGE_DENIED),
            GatewayError::PayloadTooLarge { .. } => ErrorBody::new(error_codes::PAYLOAD_TOO_LARGE),
            GatewayError::InvalidBody(e) => ErrorBody::new(e.code()),
            GatewayError::MethodNotAllowed(_) => ErrorBody::new(error_codes::METHOD_NOT_ALLOWED),
            GatewayError::StoreNotConfigured => ErrorBody::new(error_codes::STORE_NOT_CONFIGURED),
            GatewayError::Storage(e) => {
                ErrorBody::new(error_codes::INTERNAL).with_message(e.to_string())
            }
            GatewayError::InvalidConfig(msg) | GatewayError::Internal(msg) => {
                ErrorBody::new(error_codes::INTERNAL).with_message(msg.clone())
            }
            GatewayError::Io(e) => ErrorBody::new(error_codes::INTERNAL).with_message(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(GatewayError::Unauthorized.is_client_error());
        assert!(GatewayError::StoreNotConfigured.is_server_error());
        assert!(!GatewayError::Unauthorized.is_server_error());
        assert!(GatewayError::Internal("oops".into()).is_server_error());
    }

    #[test]
    fn status_codes() {
        assert_eq!(GatewayError::Unauthorized.status_code(), 401);
        assert_eq!(
            GatewayError::PurgeDenied { key: "evil".into() }.status_code(),
            403
        );
        assert_eq!(GatewayError::PayloadTooLarge { limit: 1 }.status_code(), 413);
        assert_eq!(GatewayError::MethodNotAllowed("PUT".into()).status_code(), 405);
        assert_eq!(
            GatewayError::InvalidBody(ProtocolError::NotAnObject("array")).status_code(),
            400
        );
    }

    #[test]
    fn bodies_use_wire_codes() {
        assert_eq!(GatewayError::Unauthorized.to_body().error, "Unauthorized");
        assert_eq!(
            GatewayError::PurgeDenied { key: "x".into() }.to_body().error,
            "purge_denied"
        );
        assert_eq!(
            GatewayError::StoreNotConfigured.to_body(),
            ErrorBody::new("Store not configured")
        );

        let body = GatewayError::Internal("boom".into()).to_body();
        assert_eq!(body.error, "Internal Server Error");
        assert_eq!(body.message.as_deref(), Some("boom"));
    }

    #[test]
    fn client_errors_have_no_message() {
        assert!(GatewayError::Unauthorized.to_body().message.is_none());
        assert!(GatewayError::PayloadTooLarge { limit: 10 }
            .to_body()
            .message
            .is_none());
    }
}
