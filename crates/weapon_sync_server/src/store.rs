//! Server-side event storage.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use weapon_core::{DeviceId, Event, VectorClock};

/// Result of storing one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendSummary {
    /// Events newly stored.
    pub stored: u32,
    /// Events that were already present.
    pub duplicates: u32,
}

#[derive(Debug, Default)]
struct UserEvents {
    /// Per device, events in seq order; index equals seq.
    devices: BTreeMap<DeviceId, Vec<Event>>,
    count: u64,
}

impl UserEvents {
    fn clock(&self) -> VectorClock {
        self.devices
            .iter()
            .map(|(device, events)| (*device, events.len() as u64))
            .collect()
    }
}

/// Events of every user, partitioned by user id.
///
/// The store is the opaque append/query service replicas sync against:
/// appends are idempotent on event id, and reads are ordered by
/// `(device, seq)` so a paginated pull can resume from a clock.
#[derive(Debug, Default)]
pub struct EventStore {
    users: RwLock<HashMap<String, UserEvents>>,
}

impl EventStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a batch for `user_id`.
    ///
    /// Events already stored are counted as duplicates. A stored event whose
    /// id matches but whose content differs is also counted as a duplicate
    /// and logged; the stored copy wins.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::SequenceGap`] if an event skips ahead of its
    /// device's next seq. Events before the gap stay stored.
    pub fn append(&self, user_id: &str, events: &[Event]) -> ServerResult<AppendSummary> {
        let mut users = self.users.write();
        let user = users.entry(user_id.to_string()).or_default();
        let mut summary = AppendSummary::default();

        for event in events {
            let stream = user.devices.entry(event.id.device).or_default();
            let next = stream.len() as u64;
            if event.id.seq < next {
                let stored = usize::try_from(event.id.seq)
                    .ok()
                    .and_then(|i| stream.get(i));
                if stored != Some(event) {
                    tracing::warn!(user = user_id, event = %event.id, "conflicting resubmission ignored");
                }
                summary.duplicates += 1;
                continue;
            }
            if event.id.seq > next {
                return Err(ServerError::SequenceGap {
                    device: event.id.device,
                    expected: next,
                    actual: event.id.seq,
                });
            }
            stream.push(event.clone());
            user.count += 1;
            summary.stored += 1;
        }

        Ok(summary)
    }

    /// Up to `limit` events of `user_id` not covered by `since`, ordered by
    /// `(device, seq)`, and whether more remain.
    pub fn events_since(&self, user_id: &str, since: &VectorClock, limit: u32) -> (Vec<Event>, bool) {
        let users = self.users.read();
        let Some(user) = users.get(user_id) else {
            return (Vec::new(), false);
        };

        let limit = limit as usize;
        let mut page = Vec::new();
        let mut has_more = false;
        for (device, stream) in &user.devices {
            let start = usize::try_from(since.get(device))
                .unwrap_or(usize::MAX)
                .min(stream.len());
            for event in &stream[start..] {
                if page.len() == limit {
                    has_more = true;
                    break;
                }
                page.push(event.clone());
            }
            if has_more {
                break;
            }
        }
        (page, has_more)
    }

    /// Per-device counts held for `user_id`.
    pub fn clock(&self, user_id: &str) -> VectorClock {
        self.users
            .read()
            .get(user_id)
            .map(UserEvents::clock)
            .unwrap_or_default()
    }

    /// Number of events held for `user_id`.
    pub fn count(&self, user_id: &str) -> u64 {
        self.users.read().get(user_id).map_or(0, |u| u.count)
    }

    /// Number of users with at least one stored event.
    pub fn user_count(&self) -> usize {
        self.users.read().values().filter(|u| u.count > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weapon_core::{EventId, EventPayload, ItemKey, Rating, Timestamp};

    fn event(device: u8, seq: u64) -> Event {
        Event::new(
            EventId::new(DeviceId::from_bytes([device; 16]), seq),
            Timestamp::from_millis(1_000 + seq),
            EventPayload::Review {
                key: ItemKey::lexeme("casa"),
                rating: Rating::Good,
            },
        )
    }

    #[test]
    fn append_is_idempotent() {
        let store = EventStore::new();
        let batch = vec![event(1, 0), event(1, 1)];
        assert_eq!(
            store.append("u", &batch).unwrap(),
            AppendSummary {
                stored: 2,
                duplicates: 0
            }
        );
        assert_eq!(
            store.append("u", &batch).unwrap(),
            AppendSummary {
                stored: 0,
                duplicates: 2
            }
        );
        assert_eq!(store.count("u"), 2);
        assert_eq!(store.clock("u").get(&DeviceId::from_bytes([1; 16])), 2);
    }

    #[test]
    fn gap_rejected() {
        let store = EventStore::new();
        let err = store.append("u", &[event(1, 0), event(1, 2)]).unwrap_err();
        assert!(matches!(
            err,
            ServerError::SequenceGap {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(store.count("u"), 1);
    }

    #[test]
    fn users_are_isolated() {
        let store = EventStore::new();
        store.append("alice", &[event(1, 0)]).unwrap();
        assert_eq!(store.count("bob"), 0);
        assert!(store.events_since("bob", &VectorClock::new(), 10).0.is_empty());
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn pagination_resumes_from_clock() {
        let store = EventStore::new();
        store
            .append("u", &[event(1, 0), event(1, 1), event(2, 0), event(2, 1), event(2, 2)])
            .unwrap();

        let mut since = VectorClock::new();
        let mut pages = 0;
        let mut seen = 0;
        loop {
            let (page, more) = store.events_since("u", &since, 2);
            pages += 1;
            seen += page.len();
            for e in &page {
                since.observe(e.id);
            }
            if !more {
                break;
            }
        }
        assert_eq!(seen, 5);
        assert_eq!(pages, 3);
    }
}
