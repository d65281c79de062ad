//! The durable, append-only event log.

mod record;

pub use record::{FILE_HEADER_SIZE, FORMAT_VERSION};

use crate::checkpoint::SyncCheckpoint;
use crate::config::LogConfig;
use crate::error::{LogError, LogResult, ValidationError};
use crate::event::Event;
use crate::types::{DeviceId, EventId, OrderKey};
use crate::vector_clock::VectorClock;
use record::{check_file_header, file_header, Decoded, HeaderState, LogRecord};
use std::collections::BTreeMap;
use std::ops::Bound;
use weapon_storage::{InMemoryBackend, StorageBackend};

/// What an append did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The event is new and now durable.
    Appended(EventId),
    /// An identical event was already committed; nothing changed.
    Duplicate(EventId),
}

impl AppendOutcome {
    /// Id of the event concerned.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        match self {
            Self::Appended(id) | Self::Duplicate(id) => *id,
        }
    }

    /// Returns true if the log grew.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self, Self::Appended(_))
    }
}

/// Summary counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogStats {
    /// Committed events.
    pub events: u64,
    /// Checkpoint records in the file, including superseded ones.
    pub checkpoint_records: u64,
    /// Devices that contributed events.
    pub devices: usize,
    /// Size of the log file in bytes.
    pub size_bytes: u64,
    /// Bytes cut off the tail during the last open.
    pub repaired_tail_bytes: u64,
}

/// Append-only store of committed events.
///
/// The file is the source of truth; everything else here is an index
/// rebuilt on open:
/// - `events` in canonical `(timestamp, device, seq)` order
/// - per-device seq lists, which also give the device clock
/// - `journal`, events in the order this replica appended them; its length
///   is the version token consumed by derived views
///
/// Appends are serialized by `&mut self`; callers that share a log wrap it
/// in a lock.
pub struct EventLog {
    backend: Box<dyn StorageBackend>,
    config: LogConfig,
    events: BTreeMap<OrderKey, Event>,
    devices: BTreeMap<DeviceId, Vec<OrderKey>>,
    clock: VectorClock,
    journal: Vec<OrderKey>,
    checkpoints: BTreeMap<String, SyncCheckpoint>,
    checkpoint_records: u64,
    /// Backend and offset of a checkpoint record that ends the file.
    tail_checkpoint: Option<(String, u64)>,
    repaired_tail_bytes: u64,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("events", &self.events.len())
            .field("devices", &self.devices.len())
            .field("checkpoints", &self.checkpoints.len())
            .finish_non_exhaustive()
    }
}

impl EventLog {
    /// Opens a log over `backend`, replaying every record.
    ///
    /// An empty backend gets a fresh header. An incomplete final record
    /// (a write cut short by a crash) is truncated away.
    ///
    /// # Errors
    ///
    /// Returns an error if a record header or a complete record fails its
    /// checksum, has bad framing, or holds an event that breaks log
    /// invariants. Nothing is truncated in that case.
    pub fn open(mut backend: Box<dyn StorageBackend>, config: LogConfig) -> LogResult<Self> {
        let bytes = backend.read_all()?;
        let mut repaired = 0u64;

        if check_file_header(&bytes)? == HeaderState::Torn {
            if !bytes.is_empty() {
                tracing::warn!(len = bytes.len(), "discarding torn log header");
                repaired = bytes.len() as u64;
                backend.truncate(0)?;
            }
            backend.append(&file_header())?;
            backend.sync()?;
        }

        let mut log = Self {
            backend,
            config,
            events: BTreeMap::new(),
            devices: BTreeMap::new(),
            clock: VectorClock::new(),
            journal: Vec::new(),
            checkpoints: BTreeMap::new(),
            checkpoint_records: 0,
            tail_checkpoint: None,
            repaired_tail_bytes: repaired,
        };

        if repaired == 0 && !bytes.is_empty() {
            log.replay(&bytes)?;
        }

        tracing::info!(
            events = log.events.len(),
            devices = log.devices.len(),
            backends = log.checkpoints.len(),
            repaired_tail_bytes = log.repaired_tail_bytes,
            "opened event log"
        );
        Ok(log)
    }

    /// Opens a fresh log that lives only in memory.
    ///
    /// # Errors
    ///
    /// Infallible in practice; kept fallible to match [`EventLog::open`].
    pub fn in_memory() -> LogResult<Self> {
        Self::open(Box::new(InMemoryBackend::new()), LogConfig::default())
    }

    fn replay(&mut self, bytes: &[u8]) -> LogResult<()> {
        let mut offset = FILE_HEADER_SIZE;
        while offset < bytes.len() {
            let at = offset as u64;
            match LogRecord::decode(&bytes[offset..], at)? {
                Decoded::Record { record, len } => {
                    match record {
                        LogRecord::Event(event) => {
                            self.check_next(&event)
                                .map_err(|e| LogError::corruption(at, e.to_string()))?;
                            self.index(event);
                            self.tail_checkpoint = None;
                        }
                        LogRecord::Checkpoint(checkpoint) => {
                            self.checkpoint_records += 1;
                            self.tail_checkpoint = Some((checkpoint.backend.clone(), at));
                            self.checkpoints
                                .insert(checkpoint.backend.clone(), checkpoint);
                        }
                    }
                    offset += len;
                }
                Decoded::TornTail => {
                    let dropped = (bytes.len() - offset) as u64;
                    tracing::warn!(offset = at, dropped, "truncating torn record at log tail");
                    self.backend.truncate(at)?;
                    self.backend.sync()?;
                    self.repaired_tail_bytes = dropped;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Validates and durably appends `event`.
    ///
    /// Re-appending an identical, already committed event is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Validation`] if the event is malformed, collides
    /// with a different committed event, or skips ahead in its device's
    /// sequence. Storage errors leave the log unchanged.
    pub fn append(&mut self, event: Event) -> LogResult<EventId> {
        self.append_outcome(event).map(|outcome| outcome.event_id())
    }

    /// Like [`EventLog::append`], but reports whether the event was new.
    ///
    /// # Errors
    ///
    /// See [`EventLog::append`].
    pub fn append_outcome(&mut self, event: Event) -> LogResult<AppendOutcome> {
        event.validate()?;

        if let Some(existing) = self.get(&event.id) {
            if *existing == event {
                return Ok(AppendOutcome::Duplicate(event.id));
            }
            return Err(ValidationError::IdCollision(event.id).into());
        }
        self.check_next(&event)?;

        let bytes = LogRecord::Event(event.clone()).encode()?;
        self.write_record(&bytes)?;

        let id = event.id;
        tracing::debug!(event = %id, kind = event.payload.kind(), "appended event");
        self.index(event);
        self.tail_checkpoint = None;
        Ok(AppendOutcome::Appended(id))
    }

    /// Persists sync progress for one backend, replacing the previous one.
    ///
    /// When the file already ends with a checkpoint record for the same
    /// backend, that record is overwritten in place, so repeated cycles with
    /// no new events do not grow the file. A crash mid-overwrite leaves the
    /// backend's earlier checkpoint, or none.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn record_checkpoint(&mut self, checkpoint: SyncCheckpoint) -> LogResult<()> {
        let bytes = LogRecord::Checkpoint(checkpoint.clone()).encode()?;
        let overwrite = self
            .tail_checkpoint
            .as_ref()
            .filter(|(backend, _)| *backend == checkpoint.backend)
            .map(|(_, offset)| *offset);

        let offset = match overwrite {
            Some(offset) => {
                self.replace_tail(offset, &bytes)?;
                offset
            }
            None => {
                let offset = self.backend.size()?;
                self.write_record(&bytes)?;
                self.checkpoint_records += 1;
                offset
            }
        };
        self.tail_checkpoint = Some((checkpoint.backend.clone(), offset));
        self.checkpoints
            .insert(checkpoint.backend.clone(), checkpoint);
        Ok(())
    }

    fn replace_tail(&mut self, offset: u64, bytes: &[u8]) -> LogResult<()> {
        let end = self.backend.size()?;
        let len = usize::try_from(end.saturating_sub(offset))
            .map_err(|_| LogError::corruption(offset, "tail record too large"))?;
        let previous = self.backend.read_at(offset, len)?;
        self.backend.truncate(offset)?;
        if let Err(e) = self.write_record(bytes) {
            if let Err(restore) = self.backend.append(&previous) {
                tracing::warn!(error = %restore, "could not restore replaced checkpoint");
            }
            return Err(e);
        }
        tracing::trace!(offset, "overwrote tail checkpoint");
        Ok(())
    }

    fn write_record(&mut self, bytes: &[u8]) -> LogResult<()> {
        let before = self.backend.size()?;
        let written = self.backend.append(bytes).and_then(|_| {
            if self.config.sync_on_append {
                self.backend.sync()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            if let Err(rollback) = self.backend.truncate(before) {
                tracing::warn!(error = %rollback, "could not roll back failed append");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn check_next(&self, event: &Event) -> Result<(), ValidationError> {
        let expected = self.clock.get(&event.id.device);
        if event.id.seq != expected {
            return Err(ValidationError::SequenceGap {
                device: event.id.device,
                expected,
                actual: event.id.seq,
            });
        }
        Ok(())
    }

    fn index(&mut self, event: Event) {
        let key = event.order_key();
        self.clock.observe(event.id);
        self.devices.entry(event.id.device).or_default().push(key);
        self.journal.push(key);
        self.events.insert(key, event);
    }

    /// Looks up an event by id.
    #[must_use]
    pub fn get(&self, id: &EventId) -> Option<&Event> {
        let key = self.order_key_of(id)?;
        self.events.get(&key)
    }

    /// Looks up an event by its ordering position.
    #[must_use]
    pub fn get_by_order(&self, key: &OrderKey) -> Option<&Event> {
        self.events.get(key)
    }

    fn order_key_of(&self, id: &EventId) -> Option<OrderKey> {
        let seq = usize::try_from(id.seq).ok()?;
        self.devices.get(&id.device)?.get(seq).copied()
    }

    /// Events in canonical order, starting strictly after `from`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::UnknownEvent`] if `from` is not committed.
    pub fn iterate(&self, from: Option<&EventId>) -> LogResult<impl Iterator<Item = &Event> + '_> {
        let lower = match from {
            None => Bound::Unbounded,
            Some(id) => Bound::Excluded(self.order_key_of(id).ok_or(LogError::UnknownEvent(*id))?),
        };
        Ok(self
            .events
            .range((lower, Bound::Unbounded))
            .map(|(_, event)| event))
    }

    /// Events this replica appended after the log reached `version`, in
    /// append order.
    pub fn appended_since(&self, version: u64) -> impl Iterator<Item = &Event> + '_ {
        let start = usize::try_from(version)
            .unwrap_or(usize::MAX)
            .min(self.journal.len());
        self.journal[start..]
            .iter()
            .filter_map(|key| self.events.get(key))
    }

    /// Events of `device` with seq at or after `from_seq`, in seq order.
    pub fn device_events_from(
        &self,
        device: &DeviceId,
        from_seq: u64,
    ) -> impl Iterator<Item = &Event> + '_ {
        let keys = self.devices.get(device).map(Vec::as_slice).unwrap_or(&[]);
        let start = usize::try_from(from_seq).unwrap_or(usize::MAX).min(keys.len());
        keys[start..].iter().filter_map(|key| self.events.get(key))
    }

    /// Every event not covered by `clock`, grouped by device in seq order.
    #[must_use]
    pub fn not_covered_by(&self, clock: &VectorClock) -> Vec<&Event> {
        self.devices
            .keys()
            .flat_map(|device| self.device_events_from(device, clock.get(device)))
            .collect()
    }

    /// Oldest event, by canonical order, not covered by `clock`.
    #[must_use]
    pub fn earliest_not_covered_by(&self, clock: &VectorClock) -> Option<&Event> {
        self.devices
            .keys()
            .filter_map(|device| {
                self.device_events_from(device, clock.get(device))
                    .min_by_key(|event| event.order_key())
            })
            .min_by_key(|event| event.order_key())
    }

    /// Number of committed events.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.events.len() as u64
    }

    /// Version token: advances by one for every new event, never otherwise.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.journal.len() as u64
    }

    /// Per-device counts of committed events.
    #[must_use]
    pub fn device_clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Next seq this log accepts for `device`.
    #[must_use]
    pub fn next_seq(&self, device: &DeviceId) -> u64 {
        self.clock.get(device)
    }

    /// Latest sync progress recorded for `backend`.
    #[must_use]
    pub fn checkpoint(&self, backend: &str) -> Option<&SyncCheckpoint> {
        self.checkpoints.get(backend)
    }

    /// All recorded backends and their progress.
    pub fn checkpoints(&self) -> impl Iterator<Item = &SyncCheckpoint> + '_ {
        self.checkpoints.values()
    }

    /// Summary counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage size cannot be read.
    pub fn stats(&self) -> LogResult<LogStats> {
        Ok(LogStats {
            events: self.count(),
            checkpoint_records: self.checkpoint_records,
            devices: self.devices.len(),
            size_bytes: self.backend.size()?,
            repaired_tail_bytes: self.repaired_tail_bytes,
        })
    }
}
