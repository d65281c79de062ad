//! Error types for the event log.

use crate::types::{DeviceId, EventId};
use std::io;
use thiserror::Error;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Reasons an event is refused before it reaches storage.
///
/// A refused event is never persisted and never synced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A card key has no visible text.
    #[error("card key is empty")]
    EmptyKey,

    /// A card key is longer than allowed.
    #[error("card key is {len} bytes, limit is {max}")]
    KeyTooLong {
        /// Actual length.
        len: usize,
        /// Limit.
        max: usize,
    },

    /// An add-cards edit lists no cards.
    #[error("add edit lists no cards")]
    EmptyCardList,

    /// The event carries no wall-clock time.
    #[error("event timestamp is zero")]
    ZeroTimestamp,

    /// The event skips ahead in its device's sequence.
    #[error("device {device} expects seq {expected}, got {actual}")]
    SequenceGap {
        /// Originating device.
        device: DeviceId,
        /// Next seq the log can accept for that device.
        expected: u64,
        /// Seq carried by the event.
        actual: u64,
    },

    /// A different event with the same id is already committed.
    #[error("event {0} collides with a different committed event")]
    IdCollision(EventId),
}

/// Errors raised by the event log and data directory.
#[derive(Debug, Error)]
pub enum LogError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] weapon_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The event was refused.
    #[error("invalid event: {0}")]
    Validation(#[from] ValidationError),

    /// A complete record on disk is unreadable.
    #[error("log corruption at offset {offset}: {message}")]
    Corruption {
        /// Byte offset of the bad record.
        offset: u64,
        /// What is wrong.
        message: String,
    },

    /// Record checksum does not match its contents.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Byte offset of the bad record.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Recomputed checksum.
        actual: u32,
    },

    /// A record could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// No committed event has this id.
    #[error("unknown event {0}")]
    UnknownEvent(EventId),

    /// Another process holds the data directory.
    #[error("data directory locked: another process has exclusive access")]
    DirectoryLocked,

    /// The data directory is missing or malformed.
    #[error("invalid data directory: {message}")]
    InvalidDirectory {
        /// What is wrong.
        message: String,
    },
}

impl LogError {
    /// Creates a corruption error.
    pub fn corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::Corruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid-directory error.
    pub fn invalid_directory(message: impl Into<String>) -> Self {
        Self::InvalidDirectory {
            message: message.into(),
        }
    }

    /// Returns the validation failure, if this is one.
    #[must_use]
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }
}
