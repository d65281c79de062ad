//! Log-backed sync applier.
//!
//! The engine never touches the event log directly. It reads a snapshot of
//! unsynced events, hands pulled events back, and persists its checkpoint
//! through a [`SyncApplier`].

use crate::error::SyncResult;
use parking_lot::Mutex;
use std::sync::Arc;
use weapon_core::{
    AppendOutcome, Event, EventLog, SyncCheckpoint, ValidationError, VectorClock,
};

/// What happened to a batch of pulled events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Events new to the local log.
    pub appended: u64,
    /// Events the local log already held.
    pub duplicates: u64,
    /// Events whose id matched a different local event; ignored.
    pub conflicts: u64,
}

/// Bridge between the sync engine and local storage.
pub trait SyncApplier: Send + Sync {
    /// Per-device event counts held locally.
    fn local_clock(&self) -> SyncResult<VectorClock>;

    /// Point-in-time copy of every local event not covered by `known`,
    /// grouped by device in seq order.
    fn pending_events(&self, known: &VectorClock) -> SyncResult<Vec<Event>>;

    /// Appends pulled events idempotently.
    fn apply_remote_events(&self, events: &[Event]) -> SyncResult<ApplySummary>;

    /// Loads the checkpoint for `backend`, or a fresh one.
    fn load_checkpoint(&self, backend: &str) -> SyncResult<SyncCheckpoint>;

    /// Persists a checkpoint.
    fn save_checkpoint(&self, checkpoint: SyncCheckpoint) -> SyncResult<()>;
}

/// Applier over a shared [`EventLog`].
///
/// The log lock is held only for the duration of each call, never across a
/// network request.
#[derive(Clone)]
pub struct LogApplier {
    log: Arc<Mutex<EventLog>>,
}

impl LogApplier {
    /// Wraps a shared log.
    pub fn new(log: Arc<Mutex<EventLog>>) -> Self {
        Self { log }
    }

    /// Returns the shared log.
    pub fn log(&self) -> &Arc<Mutex<EventLog>> {
        &self.log
    }
}

impl SyncApplier for LogApplier {
    fn local_clock(&self) -> SyncResult<VectorClock> {
        Ok(self.log.lock().device_clock().clone())
    }

    fn pending_events(&self, known: &VectorClock) -> SyncResult<Vec<Event>> {
        let log = self.log.lock();
        Ok(log.not_covered_by(known).into_iter().cloned().collect())
    }

    fn apply_remote_events(&self, events: &[Event]) -> SyncResult<ApplySummary> {
        let mut log = self.log.lock();
        let mut summary = ApplySummary::default();
        for event in events {
            match log.append_outcome(event.clone()) {
                Ok(AppendOutcome::Appended(_)) => summary.appended += 1,
                Ok(AppendOutcome::Duplicate(_)) => summary.duplicates += 1,
                Err(err) => match err.as_validation() {
                    Some(ValidationError::IdCollision(id)) => {
                        tracing::warn!(event = %id, "pulled event collides with a local event; ignoring");
                        summary.conflicts += 1;
                    }
                    _ => return Err(err.into()),
                },
            }
        }
        Ok(summary)
    }

    fn load_checkpoint(&self, backend: &str) -> SyncResult<SyncCheckpoint> {
        Ok(self
            .log
            .lock()
            .checkpoint(backend)
            .cloned()
            .unwrap_or_else(|| SyncCheckpoint::new(backend)))
    }

    fn save_checkpoint(&self, checkpoint: SyncCheckpoint) -> SyncResult<()> {
        self.log.lock().record_checkpoint(checkpoint)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use weapon_core::{DeviceId, EventId, EventPayload, ItemKey, Rating, Timestamp};

    fn review(device: DeviceId, seq: u64, rating: Rating) -> Event {
        Event::new(
            EventId::new(device, seq),
            Timestamp::from_millis(1_000 + seq),
            EventPayload::Review {
                key: ItemKey::lexeme("casa"),
                rating,
            },
        )
    }

    fn applier() -> LogApplier {
        LogApplier::new(Arc::new(Mutex::new(EventLog::in_memory().unwrap())))
    }

    #[test]
    fn apply_counts_duplicates_and_conflicts() {
        let applier = applier();
        let device = DeviceId::from_bytes([9; 16]);
        let first = review(device, 0, Rating::Good);

        let summary = applier
            .apply_remote_events(&[first.clone(), review(device, 1, Rating::Again)])
            .unwrap();
        assert_eq!(summary.appended, 2);

        let summary = applier
            .apply_remote_events(&[first, review(device, 1, Rating::Easy)])
            .unwrap();
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.conflicts, 1);
        assert_eq!(applier.log().lock().count(), 2);
    }

    #[test]
    fn gaps_propagate() {
        let applier = applier();
        let device = DeviceId::from_bytes([9; 16]);
        let err = applier
            .apply_remote_events(&[review(device, 3, Rating::Good)])
            .unwrap_err();
        assert!(matches!(err, SyncError::Log(_)));
    }

    #[test]
    fn pending_is_a_snapshot() {
        let applier = applier();
        let device = DeviceId::from_bytes([3; 16]);
        applier
            .apply_remote_events(&[review(device, 0, Rating::Good), review(device, 1, Rating::Good)])
            .unwrap();

        let mut known = VectorClock::new();
        known.set(device, 1);
        let pending = applier.pending_events(&known).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.seq, 1);
    }

    #[test]
    fn checkpoint_defaults_and_persists() {
        let applier = applier();
        let fresh = applier.load_checkpoint("backend1").unwrap();
        assert_eq!(fresh, SyncCheckpoint::new("backend1"));

        let mut cp = fresh;
        cp.remote_event_count = 7;
        applier.save_checkpoint(cp.clone()).unwrap();
        assert_eq!(applier.load_checkpoint("backend1").unwrap(), cp);
    }
}
