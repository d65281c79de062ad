//! Incremental fold of the event log into per-card state.

use crate::item::{apply_event, fold, ItemState};
use crate::leech::LeechPolicy;
use crate::scheduler::Scheduler;
use std::collections::{BTreeMap, BTreeSet};
use weapon_core::{EventLog, EventPayload, ItemKey, OrderKey, Timestamp};

#[derive(Debug, Clone)]
struct ItemEntry {
    state: ItemState,
    /// Canonically ordered positions of every event touching the key.
    events: Vec<OrderKey>,
}

/// Per-card state derived from an [`EventLog`].
///
/// The projector remembers the log version it has folded up to. Catching up
/// folds new events in place when they sort after everything already seen
/// for their key, and refolds the key from scratch when a late event lands
/// in the middle of its history. Either way the result equals a fold of the
/// key's events in canonical order.
#[derive(Debug, Clone, Default)]
pub struct Projector {
    items: BTreeMap<ItemKey, ItemEntry>,
    leeches: BTreeSet<ItemKey>,
    folded_version: u64,
    total_reviews: u64,
    review_days: BTreeSet<u64>,
    latest: Timestamp,
}

impl Projector {
    /// Creates an empty projector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds every event appended to `log` since the last call.
    ///
    /// Returns the number of events folded.
    pub fn catch_up<S: Scheduler + ?Sized>(
        &mut self,
        log: &EventLog,
        scheduler: &S,
        policy: &LeechPolicy,
    ) -> usize {
        let target = log.version();
        if target == self.folded_version {
            return 0;
        }
        if target < self.folded_version {
            tracing::debug!(
                folded = self.folded_version,
                target,
                "log version went backwards, rebuilding projection"
            );
            *self = Self::new();
        }

        let mut dirty = BTreeSet::new();
        let mut touched = BTreeSet::new();
        let mut folded = 0;

        for event in log.appended_since(self.folded_version) {
            folded += 1;
            self.latest = self.latest.max(event.timestamp);
            if matches!(event.payload, EventPayload::Review { .. }) {
                self.total_reviews += 1;
                self.review_days.insert(event.timestamp.day_index());
            }

            let order = event.order_key();
            for key in event.payload.keys() {
                let entry = self.items.entry(key.clone()).or_insert_with(|| ItemEntry {
                    state: ItemState::new(key.clone()),
                    events: Vec::new(),
                });
                touched.insert(key.clone());

                match entry.events.last() {
                    Some(last) if *last > order => {
                        let at = entry.events.partition_point(|k| *k < order);
                        entry.events.insert(at, order);
                        dirty.insert(key.clone());
                    }
                    _ => {
                        entry.events.push(order);
                        if !dirty.contains(key) {
                            apply_event(&mut entry.state, event, scheduler, policy);
                        }
                    }
                }
            }
        }

        for key in &dirty {
            if let Some(entry) = self.items.get_mut(key) {
                let events = entry.events.iter().filter_map(|k| log.get_by_order(k));
                entry.state = fold(key, events, scheduler, policy);
            }
        }

        for key in touched {
            let is_leech = self
                .items
                .get(&key)
                .is_some_and(|entry| policy.is_leech(&entry.state.recent));
            if is_leech {
                self.leeches.insert(key);
            } else {
                self.leeches.remove(&key);
            }
        }

        self.folded_version = target;
        tracing::debug!(folded, refolded = dirty.len(), version = target, "projection caught up");
        folded
    }

    /// State of `key`, if any event has touched it.
    #[must_use]
    pub fn get(&self, key: &ItemKey) -> Option<&ItemState> {
        self.items.get(key).map(|e| &e.state)
    }

    /// All known cards in key order.
    pub fn items(&self) -> impl Iterator<Item = &ItemState> + '_ {
        self.items.values().map(|e| &e.state)
    }

    /// Number of known cards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no card is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if `key` is currently a leech.
    #[must_use]
    pub fn is_leech(&self, key: &ItemKey) -> bool {
        self.leeches.contains(key)
    }

    /// Current leeches in key order.
    pub fn leeches(&self) -> impl Iterator<Item = &ItemState> + '_ {
        self.leeches.iter().filter_map(|k| self.get(k))
    }

    /// Log version folded so far.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.folded_version
    }

    /// Reviews folded so far, suspended cards included.
    #[must_use]
    pub const fn total_reviews(&self) -> u64 {
        self.total_reviews
    }

    /// Timestamp of the latest event folded; the epoch before any.
    #[must_use]
    pub const fn latest_timestamp(&self) -> Timestamp {
        self.latest
    }

    /// UTC day indexes with at least one review.
    #[must_use]
    pub fn review_days(&self) -> &BTreeSet<u64> {
        &self.review_days
    }
}
