//! The engine instance the UI talks to.

use crate::config::WeaponConfig;
use crate::error::{WeaponError, WeaponResult};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use weapon_core::{
    AppendOutcome, Clock, DataDir, DeviceId, Event, EventId, EventLog, EventPayload, ItemKey,
    LogStats, SystemClock, Timestamp, VectorClock,
};
use weapon_deck::{
    CardSummary, DefaultEstimator, Deck, DeckStats, FrequencyKnowledgePoint, FsrsScheduler,
    ItemState, KnowledgeCatalog, MovieStats,
};
use weapon_storage::FileBackend;
use weapon_sync_engine::{
    LogApplier, SyncConfig, SyncEngine, SyncError, SyncOutcome, SyncState, SyncTransport,
};

type Backend = SyncEngine<Arc<dyn SyncTransport>, LogApplier>;

/// A local-first learning-record store.
///
/// Owns the event log (and, when persistent, its locked data directory), the
/// derived deck, and one sync engine per registered backend. All methods
/// take `&self`; share an instance across threads with [`Arc`].
///
/// Lock order is deck before log; sync engines take only the log, and only
/// between network requests.
pub struct Weapon {
    user_id: String,
    device_id: DeviceId,
    clock: Arc<dyn Clock>,
    log: Arc<Mutex<EventLog>>,
    deck: Mutex<Deck<FsrsScheduler, DefaultEstimator>>,
    backends: RwLock<BTreeMap<String, Arc<Backend>>>,
    _dir: Option<DataDir>,
}

impl Weapon {
    /// Opens a replica with the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is locked or unreadable, the log is
    /// corrupt, or the scheduler configuration is invalid.
    pub fn open(config: WeaponConfig) -> WeaponResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Opens a replica whose event and sync timestamps come from `clock`.
    ///
    /// # Errors
    ///
    /// See [`Weapon::open`].
    pub fn open_with_clock(config: WeaponConfig, clock: Arc<dyn Clock>) -> WeaponResult<Self> {
        let scheduler = FsrsScheduler::new(config.scheduler.clone())?;
        let deck = Deck::new(
            scheduler,
            DefaultEstimator,
            config.leech_policy,
            KnowledgeCatalog::default(),
        );

        let (dir, device_id, log) = match &config.data_dir {
            Some(path) => {
                let dir = DataDir::open(path, config.log.create_if_missing)?;
                let backend = FileBackend::open(&dir.log_path())?;
                let log = EventLog::open(Box::new(backend), config.log.clone())?;
                let device_id = dir.device_id();
                (Some(dir), device_id, log)
            }
            None => {
                let device_id = config.device_id.unwrap_or_else(DeviceId::generate);
                (None, device_id, EventLog::in_memory()?)
            }
        };

        tracing::info!(
            user = %config.user_id,
            device = %device_id,
            events = log.count(),
            persistent = dir.is_some(),
            "opened weapon"
        );

        Ok(Self {
            user_id: config.user_id,
            device_id,
            clock,
            log: Arc::new(Mutex::new(log)),
            deck: Mutex::new(deck),
            backends: RwLock::new(BTreeMap::new()),
            _dir: dir,
        })
    }

    /// Principal this replica records for.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// This replica's device id.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Number of committed events. No I/O.
    pub fn num_events(&self) -> u64 {
        self.log.lock().count()
    }

    /// Log version token; moves on every new event.
    pub fn version(&self) -> u64 {
        self.log.lock().version()
    }

    /// Records a local event stamped with the next seq and the current time.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed payload, or a storage
    /// error if the append could not be made durable.
    pub fn add_event(&self, payload: EventPayload) -> WeaponResult<EventId> {
        let mut log = self.log.lock();
        let id = EventId::new(self.device_id, log.next_seq(&self.device_id));
        let event = Event::new(id, self.clock.now(), payload);
        Ok(log.append(event)?)
    }

    /// Appends an event produced elsewhere; an identical resubmission is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the event is malformed, collides with a
    /// different event, or skips ahead in its device's sequence.
    pub fn add_remote_event(&self, event: Event) -> WeaponResult<AppendOutcome> {
        Ok(self.log.lock().append_outcome(event)?)
    }

    /// Events in canonical order, strictly after `from`.
    ///
    /// # Errors
    ///
    /// Returns an error if `from` is not a committed event.
    pub fn events(&self, from: Option<&EventId>) -> WeaponResult<Vec<Event>> {
        let log = self.log.lock();
        let events = log.iterate(from)?.cloned().collect();
        Ok(events)
    }

    /// Log file statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage size cannot be read.
    pub fn log_stats(&self) -> WeaponResult<LogStats> {
        Ok(self.log.lock().stats()?)
    }

    /// Current state of one card.
    pub fn project(&self, key: &ItemKey) -> ItemState {
        let mut deck = self.deck.lock();
        let log = self.log.lock();
        deck.project(&log, key)
    }

    /// Cards that keep lapsing.
    pub fn get_leeches(&self) -> Arc<Vec<CardSummary>> {
        let mut deck = self.deck.lock();
        let log = self.log.lock();
        deck.get_leeches(&log)
    }

    /// Comprehension per movie in the catalog.
    pub fn get_movie_stats(&self) -> Arc<Vec<MovieStats>> {
        let mut deck = self.deck.lock();
        let log = self.log.lock();
        deck.get_movie_stats(&log)
    }

    /// Predicted knowledge by corpus frequency.
    pub fn get_frequency_knowledge_chart_data(&self) -> Arc<Vec<FrequencyKnowledgePoint>> {
        let mut deck = self.deck.lock();
        let log = self.log.lock();
        deck.get_frequency_knowledge_chart_data(&log)
    }

    /// Frequency-weighted share of catalog words known, 0 to 100.
    pub fn get_percent_of_words_known(&self) -> f64 {
        let mut deck = self.deck.lock();
        let log = self.log.lock();
        deck.get_percent_of_words_known(&log)
    }

    /// Review counters and due cards as of now.
    pub fn stats(&self) -> DeckStats {
        let now = self.clock.now();
        let mut deck = self.deck.lock();
        let log = self.log.lock();
        deck.stats(&log, now)
    }

    /// Replaces the word-frequency and movie catalog.
    pub fn set_catalog(&self, catalog: KnowledgeCatalog) {
        self.deck.lock().set_catalog(catalog);
    }

    /// Registers a sync backend under `name` with default batch sizes.
    ///
    /// # Errors
    ///
    /// See [`Weapon::register_backend_with`].
    pub fn register_backend(
        &self,
        name: impl Into<String>,
        transport: Arc<dyn SyncTransport>,
    ) -> WeaponResult<()> {
        self.register_backend_with(name, transport, |config| config)
    }

    /// Registers a sync backend, letting `configure` adjust its settings.
    ///
    /// A cycle a previous process left unfinished on this backend is closed
    /// out with an error.
    ///
    /// # Errors
    ///
    /// Returns [`WeaponError::BackendExists`] if the name is taken, or an
    /// error if the checkpoint cannot be written.
    pub fn register_backend_with(
        &self,
        name: impl Into<String>,
        transport: Arc<dyn SyncTransport>,
        configure: impl FnOnce(SyncConfig) -> SyncConfig,
    ) -> WeaponResult<()> {
        let name = name.into();
        let mut backends = self.backends.write();
        if backends.contains_key(&name) {
            return Err(WeaponError::BackendExists(name));
        }
        let config = configure(SyncConfig::new(self.user_id.clone(), self.device_id));
        let engine = SyncEngine::new(
            name.clone(),
            config,
            transport,
            LogApplier::new(Arc::clone(&self.log)),
        )
        .with_clock(Arc::clone(&self.clock));
        engine.recover()?;
        tracing::info!(backend = %name, "registered sync backend");
        backends.insert(name, Arc::new(engine));
        Ok(())
    }

    /// Names of registered backends.
    pub fn backends(&self) -> Vec<String> {
        self.backends.read().keys().cloned().collect()
    }

    /// Persisted sync status of `backend`. A backend that never synced has
    /// every field unset. No I/O.
    pub fn get_sync_state(&self, backend: &str) -> SyncState {
        self.log
            .lock()
            .checkpoint(backend)
            .map(SyncState::from)
            .unwrap_or_default()
    }

    /// Time of the oldest local event `backend` has not acknowledged, or
    /// `None` when fully synced.
    pub fn get_timestamp_of_earliest_unsynced_event(&self, backend: &str) -> Option<Timestamp> {
        let log = self.log.lock();
        let none = VectorClock::new();
        let acknowledged = log
            .checkpoint(backend)
            .map_or(&none, |checkpoint| &checkpoint.acknowledged);
        log.earliest_not_covered_by(acknowledged)
            .map(|event| event.timestamp)
    }

    /// Events `backend` held as of the last successful cycle. No I/O.
    pub fn num_events_on_remote_as_of_last_sync(&self, backend: &str) -> u64 {
        self.log
            .lock()
            .checkpoint(backend)
            .map_or(0, |checkpoint| checkpoint.remote_event_count)
    }

    /// Runs one sync cycle against `backend`, blocking until it ends.
    ///
    /// Network and remote failures come back as [`SyncOutcome::Failed`] and
    /// are recorded in [`Weapon::get_sync_state`].
    ///
    /// # Errors
    ///
    /// Returns an error if `backend` is not registered or is already syncing.
    pub fn sync(&self, backend: &str) -> WeaponResult<SyncOutcome> {
        let engine = self
            .backends
            .read()
            .get(backend)
            .cloned()
            .ok_or_else(|| SyncError::UnknownBackend(backend.to_string()))?;
        Ok(engine.sync()?)
    }

    /// Runs [`Weapon::sync`] on the blocking pool.
    ///
    /// Dropping the returned future does not cancel the cycle; it runs to
    /// completion and records its outcome.
    ///
    /// # Errors
    ///
    /// See [`Weapon::sync`].
    pub async fn sync_async(self: Arc<Self>, backend: String) -> WeaponResult<SyncOutcome> {
        tokio::task::spawn_blocking(move || self.sync(&backend))
            .await
            .map_err(|e| WeaponError::Background(e.to_string()))?
    }
}

impl std::fmt::Debug for Weapon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Weapon")
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("backends", &self.backends())
            .finish_non_exhaustive()
    }
}
