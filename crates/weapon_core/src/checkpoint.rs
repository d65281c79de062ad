//! Persisted per-backend sync progress.

use crate::types::Timestamp;
use crate::vector_clock::VectorClock;
use serde::{Deserialize, Serialize};

/// Sync progress for one named backend, stored in the event log file.
///
/// The latest checkpoint for a backend wins on replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    /// Backend name.
    pub backend: String,
    /// Events the backend has confirmed storing, as of the last commit.
    pub acknowledged: VectorClock,
    /// Events the backend held for this user at the last commit.
    #[serde(default)]
    pub remote_event_count: u64,
    /// When the most recent cycle started.
    pub last_sync_started: Option<Timestamp>,
    /// When the most recent cycle ended, successfully or not.
    pub last_sync_finished: Option<Timestamp>,
    /// Error of the most recent cycle, cleared on success.
    pub last_sync_error: Option<String>,
}

impl SyncCheckpoint {
    /// Fresh checkpoint for a backend that has never synced.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }

    /// Returns true if a cycle started and has not finished since.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        match (self.last_sync_started, self.last_sync_finished) {
            (Some(_), None) => true,
            (Some(started), Some(finished)) => finished < started,
            (None, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_progress_rules() {
        let mut cp = SyncCheckpoint::new("backend1");
        assert!(!cp.in_progress());

        cp.last_sync_started = Some(Timestamp::from_millis(10));
        assert!(cp.in_progress());

        cp.last_sync_finished = Some(Timestamp::from_millis(12));
        assert!(!cp.in_progress());

        cp.last_sync_started = Some(Timestamp::from_millis(20));
        assert!(cp.in_progress());
    }
}
