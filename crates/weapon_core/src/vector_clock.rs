//! Per-device event counts.

use crate::types::{DeviceId, EventId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How many events from each device a replica holds.
///
/// Because per-device sequences are gap-free, a count of `n` for a device
/// means the replica holds seqs `0..n` of that device and nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock(BTreeMap<DeviceId, u64>);

impl VectorClock {
    /// Creates an empty clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events held from `device`.
    #[must_use]
    pub fn get(&self, device: &DeviceId) -> u64 {
        self.0.get(device).copied().unwrap_or(0)
    }

    /// Sets the count for `device`.
    pub fn set(&mut self, device: DeviceId, count: u64) {
        if count == 0 {
            self.0.remove(&device);
        } else {
            self.0.insert(device, count);
        }
    }

    /// Records that `id` is held.
    pub fn observe(&mut self, id: EventId) {
        let next = id.seq.saturating_add(1);
        if next > self.get(&id.device) {
            self.set(id.device, next);
        }
    }

    /// Returns true if `id` is within the counted prefix of its device.
    #[must_use]
    pub fn covers(&self, id: &EventId) -> bool {
        id.seq < self.get(&id.device)
    }

    /// Pointwise maximum with `other`.
    pub fn merge(&mut self, other: &Self) {
        for (device, count) in &other.0 {
            if *count > self.get(device) {
                self.0.insert(*device, *count);
            }
        }
    }

    /// Pointwise minimum with `other`.
    #[must_use]
    pub fn meet(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for (device, count) in &self.0 {
            out.set(*device, (*count).min(other.get(device)));
        }
        out
    }

    /// Returns true if every count here is at most the matching count in `other`.
    #[must_use]
    pub fn dominated_by(&self, other: &Self) -> bool {
        self.0.iter().all(|(device, count)| *count <= other.get(device))
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Iterates `(device, count)` pairs in device order.
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &u64)> {
        self.0.iter()
    }

    /// Returns true if no device has any events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(DeviceId, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (DeviceId, u64)>>(iter: I) -> Self {
        let mut clock = Self::new();
        for (device, count) in iter {
            clock.set(device, count);
        }
        clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(n: u8) -> DeviceId {
        DeviceId::from_bytes([n; 16])
    }

    #[test]
    fn observe_and_cover() {
        let mut clock = VectorClock::new();
        clock.observe(EventId::new(dev(1), 0));
        clock.observe(EventId::new(dev(1), 1));
        assert_eq!(clock.get(&dev(1)), 2);
        assert!(clock.covers(&EventId::new(dev(1), 1)));
        assert!(!clock.covers(&EventId::new(dev(1), 2)));
        assert!(!clock.covers(&EventId::new(dev(2), 0)));
    }

    #[test]
    fn merge_and_meet() {
        let a: VectorClock = [(dev(1), 3), (dev(2), 1)].into_iter().collect();
        let b: VectorClock = [(dev(1), 1), (dev(3), 4)].into_iter().collect();

        let mut merged = a.clone();
        merged.merge(&b);
        assert_eq!(merged.get(&dev(1)), 3);
        assert_eq!(merged.get(&dev(3)), 4);
        assert_eq!(merged.total(), 8);

        let met = a.meet(&b);
        assert_eq!(met.get(&dev(1)), 1);
        assert_eq!(met.get(&dev(2)), 0);
        assert!(met.dominated_by(&a));
        assert!(met.dominated_by(&b));
        assert!(!a.dominated_by(&b));
    }

    #[test]
    fn zero_counts_are_dropped() {
        let clock: VectorClock = [(dev(1), 0)].into_iter().collect();
        assert!(clock.is_empty());
    }
}
