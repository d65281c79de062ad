//! Error types for the sync server.

use thiserror::Error;
use weapon_core::DeviceId;
use weapon_sync_protocol::{ErrorResponse, RejectionCode};

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The token was genuine but is too old.
    #[error("token expired")]
    TokenExpired,

    /// Protocol version mismatch.
    #[error("protocol version mismatch: server={server}, client={client}")]
    ProtocolMismatch {
        /// Server version.
        server: u16,
        /// Client version.
        client: u16,
    },

    /// Request exceeds a batch limit.
    #[error("batch of {size} exceeds limit {limit}")]
    TooLarge {
        /// Submitted size.
        size: usize,
        /// Configured limit.
        limit: u32,
    },

    /// A device's events arrived out of seq order.
    #[error("sequence gap for device {device}: expected seq {expected}, got {actual}")]
    SequenceGap {
        /// Device.
        device: DeviceId,
        /// Next seq the store accepts.
        expected: u64,
        /// Seq that arrived.
        actual: u64,
    },

    /// Unknown endpoint.
    #[error("no route for {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Internal(_))
    }

    /// Wire reason for this error.
    pub fn rejection_code(&self) -> RejectionCode {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::SequenceGap { .. }
            | ServerError::NotFound(_) => RejectionCode::BadRequest,
            ServerError::AuthenticationFailed(_) => RejectionCode::Unauthorized,
            ServerError::TokenExpired => RejectionCode::TokenExpired,
            ServerError::ProtocolMismatch { .. } => RejectionCode::UnsupportedVersion,
            ServerError::TooLarge { .. } => RejectionCode::TooLarge,
            ServerError::Internal(_) => RejectionCode::Internal,
        }
    }

    /// Converts into a wire refusal.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.rejection_code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::TokenExpired.is_server_error());
    }

    #[test]
    fn rejection_codes() {
        assert_eq!(
            ServerError::TokenExpired.rejection_code(),
            RejectionCode::TokenExpired
        );
        let response = ServerError::TooLarge { size: 9, limit: 4 }.to_response();
        assert_eq!(response.code, RejectionCode::TooLarge);
        assert!(response.message.contains('9'));
    }
}
