//! Error types for the sync engine.

use thiserror::Error;
use weapon_core::LogError;
use weapon_sync_protocol::{ProtocolError, RejectionCode};

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote could not be reached.
    #[error("remote unreachable: {0}")]
    Connectivity(String),

    /// A request took longer than the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The remote refused the request.
    #[error("remote rejected request ({code}): {message}")]
    RemoteRejection {
        /// Remote's reason.
        code: RejectionCode,
        /// Remote's detail.
        message: String,
    },

    /// The remote answered with something the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Protocol versions differ.
    #[error("protocol version mismatch: local={local}, remote={remote}")]
    VersionMismatch {
        /// Local protocol version.
        local: u16,
        /// Remote protocol version.
        remote: u16,
    },

    /// The local log failed.
    #[error("local log error: {0}")]
    Log(#[from] LogError),

    /// A cycle for this backend is already running.
    #[error("sync already in progress for backend {backend:?}")]
    AlreadyInProgress {
        /// Backend name.
        backend: String,
    },

    /// No backend of that name is registered.
    #[error("unknown sync backend {0:?}")]
    UnknownBackend(String),
}

impl SyncError {
    /// Creates a connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity(message.into())
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Connectivity(_) | SyncError::Timeout | SyncError::AlreadyInProgress { .. } => {
                true
            }
            SyncError::RemoteRejection { code, .. } => code.is_retryable(),
            _ => false,
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::connectivity("connection refused").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::RemoteRejection {
            code: RejectionCode::Unavailable,
            message: "busy".into(),
        }
        .is_retryable());
        assert!(!SyncError::RemoteRejection {
            code: RejectionCode::TokenExpired,
            message: "expired".into(),
        }
        .is_retryable());
        assert!(!SyncError::protocol("bad page").is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::VersionMismatch {
            local: 1,
            remote: 2,
        };
        assert!(err.to_string().contains('1'));
        assert!(err.to_string().contains('2'));

        let err = SyncError::RemoteRejection {
            code: RejectionCode::TokenExpired,
            message: "token expired".into(),
        };
        assert_eq!(
            err.to_string(),
            "remote rejected request (token_expired): token expired"
        );
    }
}
