//! Per-backend sync state machine.

use crate::applier::SyncApplier;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use weapon_core::{Clock, SyncCheckpoint, SystemClock, Timestamp, VectorClock};
use weapon_sync_protocol::{HandshakeRequest, PullRequest, PushRequest};

/// Live phase of one backend's engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No cycle running.
    Idle,
    /// A cycle is running.
    Syncing,
    /// A cycle just failed; transient, the engine returns to `Idle`.
    Errored,
}

impl SyncPhase {
    /// Returns true if a new cycle may start.
    pub fn can_start_sync(&self) -> bool {
        !matches!(self, SyncPhase::Syncing)
    }
}

/// Persisted sync status for one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// When the most recent cycle started.
    pub last_sync_started: Option<Timestamp>,
    /// When the most recent cycle ended.
    pub last_sync_finished: Option<Timestamp>,
    /// Error of the most recent cycle; `None` after a success.
    pub last_sync_error: Option<String>,
}

impl SyncState {
    /// Returns true if a cycle started and has not finished since.
    pub fn in_progress(&self) -> bool {
        match (self.last_sync_started, self.last_sync_finished) {
            (Some(_), None) => true,
            (Some(started), Some(finished)) => finished < started,
            (None, _) => false,
        }
    }
}

impl From<&SyncCheckpoint> for SyncState {
    fn from(checkpoint: &SyncCheckpoint) -> Self {
        Self {
            last_sync_started: checkpoint.last_sync_started,
            last_sync_finished: checkpoint.last_sync_finished,
            last_sync_error: checkpoint.last_sync_error.clone(),
        }
    }
}

/// Counts for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Events the remote newly stored.
    pub pushed: u64,
    /// Events newly appended locally.
    pub pulled: u64,
    /// Events either side already had.
    pub duplicates: u64,
    /// Remote event count at commit.
    pub remote_event_count: u64,
    /// Wall time of the cycle.
    pub duration: Duration,
}

/// How a cycle ended.
///
/// A failed cycle is not an `Err`: its error is recorded in [`SyncState`] and
/// handed back here for the caller to inspect.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The cycle committed.
    Completed(SyncReport),
    /// The cycle aborted; watermarks are unchanged.
    Failed {
        /// Why.
        error: SyncError,
        /// Work done before the failure.
        report: SyncReport,
    },
}

impl SyncOutcome {
    /// Returns true if the cycle committed.
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Completed(_))
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&SyncError> {
        match self {
            SyncOutcome::Completed(_) => None,
            SyncOutcome::Failed { error, .. } => Some(error),
        }
    }

    /// Cycle counts.
    pub fn report(&self) -> &SyncReport {
        match self {
            SyncOutcome::Completed(report) | SyncOutcome::Failed { report, .. } => report,
        }
    }
}

/// Statistics about sync operations since the engine was created.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that committed.
    pub cycles_completed: u64,
    /// Cycles that failed.
    pub cycles_failed: u64,
    /// Events pushed.
    pub events_pushed: u64,
    /// Events pulled.
    pub events_pulled: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Drives sync cycles between the local log and one named backend.
pub struct SyncEngine<T: SyncTransport, A: SyncApplier> {
    backend: String,
    config: SyncConfig,
    transport: T,
    applier: A,
    clock: Arc<dyn Clock>,
    cycle: Mutex<()>,
    phase: RwLock<SyncPhase>,
    stats: RwLock<SyncStats>,
}

impl<T: SyncTransport, A: SyncApplier> SyncEngine<T, A> {
    /// Creates an engine for `backend` using the system clock.
    ///
    /// The transport takes its request timeout from `config`.
    pub fn new(backend: impl Into<String>, config: SyncConfig, transport: T, applier: A) -> Self {
        transport.set_timeout(config.timeout);
        Self {
            backend: backend.into(),
            config,
            transport,
            applier,
            clock: Arc::new(SystemClock),
            cycle: Mutex::new(()),
            phase: RwLock::new(SyncPhase::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Replaces the clock used for sync timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Backend name.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The applier.
    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Live phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Persisted status of this backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be read.
    pub fn state(&self) -> SyncResult<SyncState> {
        Ok(SyncState::from(&self.applier.load_checkpoint(&self.backend)?))
    }

    /// Events the backend confirmed storing, as of the last commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be read.
    pub fn acknowledged(&self) -> SyncResult<VectorClock> {
        Ok(self.applier.load_checkpoint(&self.backend)?.acknowledged)
    }

    /// Remote event count as of the last commit. No network I/O.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be read.
    pub fn num_events_on_remote_as_of_last_sync(&self) -> SyncResult<u64> {
        Ok(self
            .applier
            .load_checkpoint(&self.backend)?
            .remote_event_count)
    }

    /// Closes out a cycle a previous process started but never finished.
    ///
    /// Returns true if such a cycle was found.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyInProgress`] if a cycle is running now, or
    /// an error if the checkpoint cannot be written.
    pub fn recover(&self) -> SyncResult<bool> {
        let _cycle = self.cycle.try_lock().ok_or_else(|| SyncError::AlreadyInProgress {
            backend: self.backend.clone(),
        })?;
        let mut checkpoint = self.applier.load_checkpoint(&self.backend)?;
        if !checkpoint.in_progress() {
            return Ok(false);
        }
        tracing::warn!(backend = %self.backend, "closing out interrupted sync cycle");
        checkpoint.last_sync_finished = Some(self.clock.now());
        checkpoint.last_sync_error = Some("sync interrupted before completion".into());
        self.applier.save_checkpoint(checkpoint)?;
        Ok(true)
    }

    /// Runs one push-pull-commit cycle.
    ///
    /// Transport and remote failures do not surface as `Err`; they are
    /// recorded in [`SyncState`] and returned as [`SyncOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyInProgress`] if a cycle for this backend
    /// is already running.
    pub fn sync(&self) -> SyncResult<SyncOutcome> {
        let _cycle = self.cycle.try_lock().ok_or_else(|| SyncError::AlreadyInProgress {
            backend: self.backend.clone(),
        })?;
        *self.phase.write() = SyncPhase::Syncing;

        let start = Instant::now();
        let mut report = SyncReport::default();
        tracing::info!(backend = %self.backend, "sync cycle started");

        let result = self.run_cycle(&mut report);
        report.duration = start.elapsed();

        let outcome = match result {
            Ok(()) => {
                tracing::info!(
                    backend = %self.backend,
                    pushed = report.pushed,
                    pulled = report.pulled,
                    remote_events = report.remote_event_count,
                    "sync cycle completed"
                );
                let mut stats = self.stats.write();
                stats.cycles_completed += 1;
                stats.events_pushed += report.pushed;
                stats.events_pulled += report.pulled;
                stats.last_error = None;
                SyncOutcome::Completed(report)
            }
            Err(error) => {
                *self.phase.write() = SyncPhase::Errored;
                tracing::warn!(backend = %self.backend, error = %error, "sync cycle failed");
                self.record_failure(&error);
                let mut stats = self.stats.write();
                stats.cycles_failed += 1;
                stats.events_pushed += report.pushed;
                stats.events_pulled += report.pulled;
                stats.last_error = Some(error.to_string());
                SyncOutcome::Failed { error, report }
            }
        };

        *self.phase.write() = SyncPhase::Idle;
        Ok(outcome)
    }

    fn run_cycle(&self, report: &mut SyncReport) -> SyncResult<()> {
        // Offline attempts never mark a cycle as started.
        if !self.transport.is_connected() {
            return Err(SyncError::connectivity(format!(
                "backend {} is unreachable",
                self.backend
            )));
        }

        let mut checkpoint = self.applier.load_checkpoint(&self.backend)?;
        checkpoint.last_sync_started = Some(self.clock.now());
        self.applier.save_checkpoint(checkpoint.clone())?;

        let credentials = self.config.credentials();
        let handshake = self.transport.handshake(&HandshakeRequest {
            credentials: credentials.clone(),
            protocol_version: self.config.protocol_version,
        })?;
        if handshake.protocol_version != self.config.protocol_version {
            return Err(SyncError::VersionMismatch {
                local: self.config.protocol_version,
                remote: handshake.protocol_version,
            });
        }
        let mut remote_clock = handshake.remote_clock;
        let mut remote_count = handshake.event_count;

        // Push
        let mut known = checkpoint.acknowledged.clone();
        known.merge(&remote_clock);
        let pending = self.applier.pending_events(&known)?;
        tracing::debug!(backend = %self.backend, pending = pending.len(), "pushing");
        for batch in pending.chunks(batch_len(self.config.push_batch_size)) {
            let response = self.transport.push(&PushRequest {
                credentials: credentials.clone(),
                events: batch.to_vec(),
            })?;
            report.pushed += u64::from(response.stored);
            report.duplicates += u64::from(response.duplicates);
            remote_clock.merge(&response.remote_clock);
            remote_count = response.event_count;
        }

        // Pull
        loop {
            let since = self.applier.local_clock()?;
            let response = self.transport.pull(&PullRequest {
                credentials: credentials.clone(),
                since,
                limit: self.config.pull_batch_size,
            })?;
            let applied = self.applier.apply_remote_events(&response.events)?;
            report.pulled += applied.appended;
            report.duplicates += applied.duplicates + applied.conflicts;
            remote_clock.merge(&response.remote_clock);
            remote_count = response.event_count;

            if !response.has_more {
                break;
            }
            if applied.appended == 0 {
                return Err(SyncError::protocol(
                    "pull page made no progress but more events remain",
                ));
            }
        }

        // Commit
        let local = self.applier.local_clock()?;
        checkpoint.acknowledged.merge(&remote_clock.meet(&local));
        checkpoint.remote_event_count = remote_count;
        checkpoint.last_sync_finished = Some(self.clock.now());
        checkpoint.last_sync_error = None;
        self.applier.save_checkpoint(checkpoint)?;
        report.remote_event_count = remote_count;
        Ok(())
    }

    fn record_failure(&self, error: &SyncError) {
        let recorded = self
            .applier
            .load_checkpoint(&self.backend)
            .and_then(|mut checkpoint| {
                checkpoint.last_sync_finished = Some(self.clock.now());
                checkpoint.last_sync_error = Some(error.to_string());
                self.applier.save_checkpoint(checkpoint)
            });
        if let Err(e) = recorded {
            tracing::warn!(backend = %self.backend, error = %e, "could not record sync failure");
        }
    }
}

fn batch_len(size: u32) -> usize {
    usize::try_from(size).unwrap_or(usize::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::LogApplier;
    use crate::transport::MockTransport;
    use weapon_core::{
        DeviceId, Event, EventId, EventLog, EventPayload, ItemKey, ManualClock, Rating,
    };
    use weapon_sync_protocol::{HandshakeResponse, PullResponse, PushResponse, PROTOCOL_VERSION};

    fn device() -> DeviceId {
        DeviceId::from_bytes([1; 16])
    }

    fn review(seq: u64) -> Event {
        Event::new(
            EventId::new(device(), seq),
            Timestamp::from_millis(1_000 + seq),
            EventPayload::Review {
                key: ItemKey::lexeme("casa"),
                rating: Rating::Good,
            },
        )
    }

    fn engine(mock: MockTransport) -> SyncEngine<MockTransport, LogApplier> {
        let log = Arc::new(Mutex::new(EventLog::in_memory().unwrap()));
        let applier = LogApplier::new(log);
        SyncEngine::new("backend1", SyncConfig::new("user-1", device()), mock, applier)
            .with_clock(Arc::new(ManualClock::new(10_000)))
    }

    fn clock_of(count: u64) -> VectorClock {
        [(device(), count)].into_iter().collect()
    }

    #[test]
    fn sync_state_in_progress() {
        let mut state = SyncState::default();
        assert!(!state.in_progress());
        state.last_sync_started = Some(Timestamp::from_millis(5));
        assert!(state.in_progress());
        state.last_sync_finished = Some(Timestamp::from_millis(4));
        assert!(state.in_progress());
        state.last_sync_finished = Some(Timestamp::from_millis(6));
        assert!(!state.in_progress());
    }

    #[test]
    fn offline_sync_fails_fast_and_records_error() {
        let mock = MockTransport::new();
        mock.set_connected(false);
        let engine = engine(mock);

        let outcome = engine.sync().unwrap();
        assert!(matches!(outcome.error(), Some(SyncError::Connectivity(_))));

        let state = engine.state().unwrap();
        assert!(state.last_sync_error.is_some());
        assert!(!state.in_progress());
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert_eq!(engine.stats().cycles_failed, 1);
    }

    #[test]
    fn repeated_offline_syncs_keep_one_checkpoint_record() {
        let mock = MockTransport::new();
        mock.set_connected(false);
        let engine = engine(mock);
        engine.applier().log().lock().append(review(0)).unwrap();

        engine.sync().unwrap();
        let size = engine.applier().log().lock().stats().unwrap().size_bytes;
        for _ in 0..1_000 {
            assert!(!engine.sync().unwrap().is_success());
        }

        let stats = engine.applier().log().lock().stats().unwrap();
        assert_eq!(stats.checkpoint_records, 1);
        assert_eq!(stats.size_bytes, size);
        assert_eq!(stats.events, 1);
        assert!(engine.state().unwrap().last_sync_started.is_none());
        assert_eq!(engine.stats().cycles_failed, 1_001);
    }

    #[test]
    fn transport_gets_configured_timeout() {
        let log = Arc::new(Mutex::new(EventLog::in_memory().unwrap()));
        let config =
            SyncConfig::new("user-1", device()).with_timeout(Duration::from_millis(1_500));
        let engine = SyncEngine::new("backend1", config, MockTransport::new(), LogApplier::new(log));
        assert_eq!(engine.transport().timeout(), Some(Duration::from_millis(1_500)));
    }

    #[test]
    fn successful_cycle_commits_watermark() {
        let mock = MockTransport::new();
        mock.set_handshake_response(HandshakeResponse {
            protocol_version: PROTOCOL_VERSION,
            remote_clock: VectorClock::new(),
            event_count: 0,
        });
        mock.set_push_response(PushResponse {
            stored: 2,
            duplicates: 0,
            remote_clock: clock_of(2),
            event_count: 2,
        });
        mock.set_pull_response(PullResponse {
            events: Vec::new(),
            has_more: false,
            remote_clock: clock_of(2),
            event_count: 2,
        });
        let engine = engine(mock);
        {
            let mut log = engine.applier().log().lock();
            log.append(review(0)).unwrap();
            log.append(review(1)).unwrap();
        }

        let outcome = engine.sync().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.report().pushed, 2);
        assert_eq!(engine.transport().pushed().len(), 1);
        assert_eq!(engine.acknowledged().unwrap(), clock_of(2));
        assert_eq!(engine.num_events_on_remote_as_of_last_sync().unwrap(), 2);

        let state = engine.state().unwrap();
        assert!(state.last_sync_finished > state.last_sync_started);
        assert!(state.last_sync_error.is_none());
    }

    #[test]
    fn version_mismatch_fails_cycle() {
        let mock = MockTransport::new();
        mock.set_handshake_response(HandshakeResponse {
            protocol_version: PROTOCOL_VERSION + 1,
            remote_clock: VectorClock::new(),
            event_count: 0,
        });
        let engine = engine(mock);
        let outcome = engine.sync().unwrap();
        assert!(matches!(
            outcome.error(),
            Some(SyncError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn stalled_pull_is_a_protocol_error() {
        let mock = MockTransport::new();
        mock.set_handshake_response(HandshakeResponse {
            protocol_version: PROTOCOL_VERSION,
            remote_clock: VectorClock::new(),
            event_count: 0,
        });
        mock.set_pull_response(PullResponse {
            events: Vec::new(),
            has_more: true,
            remote_clock: VectorClock::new(),
            event_count: 5,
        });
        let engine = engine(mock);
        let outcome = engine.sync().unwrap();
        assert!(matches!(outcome.error(), Some(SyncError::Protocol(_))));
        assert_eq!(engine.num_events_on_remote_as_of_last_sync().unwrap(), 0);
    }

    #[test]
    fn recover_closes_interrupted_cycle() {
        let engine = engine(MockTransport::new());
        let mut checkpoint = SyncCheckpoint::new("backend1");
        checkpoint.last_sync_started = Some(Timestamp::from_millis(500));
        engine.applier().save_checkpoint(checkpoint).unwrap();
        assert!(engine.state().unwrap().in_progress());

        assert!(engine.recover().unwrap());
        let state = engine.state().unwrap();
        assert!(!state.in_progress());
        assert!(state.last_sync_error.is_some());
        assert!(!engine.recover().unwrap());
    }

    #[test]
    fn concurrent_cycle_is_refused() {
        let engine = engine(MockTransport::new());
        let _held = engine.cycle.lock();
        assert!(matches!(
            engine.sync(),
            Err(SyncError::AlreadyInProgress { .. })
        ));
    }
}
