//! CLI command implementations.

pub mod dump_log;
pub mod inspect;
pub mod leeches;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use weapon_core::{log_file_path, EventLog, LogConfig, LogError};
use weapon_deck::DeckError;
use weapon_storage::InMemoryBackend;

/// Errors shared by the commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No event log at the given path.
    #[error("no event log found at {0}")]
    NotFound(PathBuf),

    /// The log could not be read.
    #[error(transparent)]
    Log(#[from] LogError),

    /// Bad leech parameters.
    #[error(transparent)]
    Deck(#[from] DeckError),

    /// A device id argument did not parse.
    #[error("invalid device id {0:?}")]
    InvalidDevice(String),

    /// Reading the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Replays the log of `dir` from a private in-memory copy.
pub fn load_log(dir: &Path) -> Result<EventLog, CliError> {
    let path = log_file_path(dir);
    if !path.exists() {
        return Err(CliError::NotFound(dir.to_path_buf()));
    }
    let bytes = fs::read(&path)?;
    tracing::debug!(path = %path.display(), len = bytes.len(), "loaded log copy");
    Ok(EventLog::open(
        Box::new(InMemoryBackend::with_data(bytes)),
        LogConfig::default(),
    )?)
}

#[cfg(test)]
pub(crate) mod testdir {
    use std::path::Path;
    use weapon_core::{
        DataDir, DeviceId, Event, EventId, EventLog, EventPayload, ItemKey, LogConfig, Rating,
        SyncCheckpoint, Timestamp,
    };
    use weapon_storage::FileBackend;

    /// Writes a data directory with `ratings` as reviews of "casa".
    pub fn write(path: &Path, ratings: &[Rating]) -> DeviceId {
        let dir = DataDir::open(path, true).unwrap();
        let backend = FileBackend::open(&dir.log_path()).unwrap();
        let mut log = EventLog::open(Box::new(backend), LogConfig::default()).unwrap();
        for (seq, rating) in ratings.iter().enumerate() {
            log.append(Event::new(
                EventId::new(dir.device_id(), seq as u64),
                Timestamp::from_millis(1_000 + seq as u64 * 1_000),
                EventPayload::Review {
                    key: ItemKey::lexeme("casa"),
                    rating: *rating,
                },
            ))
            .unwrap();
        }
        let mut checkpoint = SyncCheckpoint::new("backend1");
        checkpoint.remote_event_count = 1;
        log.record_checkpoint(checkpoint).unwrap();
        dir.device_id()
    }
}
