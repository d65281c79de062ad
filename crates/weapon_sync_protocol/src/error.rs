//! Error types for the wire codec.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A message could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Bytes did not decode to the expected message.
    #[error("decode failed: {0}")]
    Decode(String),
}
