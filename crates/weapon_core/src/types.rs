//! Identity and time types shared by every weapon crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of one device (one engine instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Generates a fresh random device id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Builds a device id from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DeviceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Wall-clock time in milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Milliseconds in one UTC day.
    pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    /// Creates a timestamp from epoch milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns epoch milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns this timestamp shifted forward by `ms` milliseconds.
    #[must_use]
    pub const fn plus_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Index of the UTC day this timestamp falls in.
    #[must_use]
    pub const fn day_index(self) -> u64 {
        self.0 / Self::DAY_MS
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Identity of one event: the device that created it and its position in
/// that device's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId {
    /// Originating device.
    pub device: DeviceId,
    /// Zero-based, gap-free position on the originating device.
    pub seq: u64,
}

impl EventId {
    /// Creates an event id.
    #[must_use]
    pub const fn new(device: DeviceId, seq: u64) -> Self {
        Self { device, seq }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.device, self.seq)
    }
}

/// Canonical projection order: wall-clock time first, then device, then seq.
///
/// Field order matters; the derived `Ord` is the canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    /// Wall-clock time of the event.
    pub timestamp: Timestamp,
    /// Originating device.
    pub device: DeviceId,
    /// Sequence on the originating device.
    pub seq: u64,
}

impl OrderKey {
    /// Returns the event id this key orders.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        EventId::new(self.device, self.seq)
    }
}

/// Which kind of card an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// A dictionary word.
    Lexeme,
    /// A spelling shared by words that are pronounced differently.
    Heteronym,
    /// A listening exercise for a pronunciation.
    Listening,
}

impl ItemKind {
    /// Short lowercase name used in text output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexeme => "lexeme",
            Self::Heteronym => "heteronym",
            Self::Listening => "listening",
        }
    }
}

/// Stable identity of a card, independent of any event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    /// Card kind.
    pub kind: ItemKind,
    /// The word or phrase.
    pub text: String,
}

impl ItemKey {
    /// Creates a key.
    pub fn new(kind: ItemKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Shorthand for a lexeme card.
    pub fn lexeme(text: impl Into<String>) -> Self {
        Self::new(ItemKind::Lexeme, text)
    }

    /// Shorthand for a listening card.
    pub fn listening(text: impl Into<String>) -> Self {
        Self::new(ItemKind::Listening, text)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_key_sorts_by_time_first() {
        let a = DeviceId::from_bytes([1; 16]);
        let b = DeviceId::from_bytes([2; 16]);

        let early_b = OrderKey {
            timestamp: Timestamp::from_millis(10),
            device: b,
            seq: 7,
        };
        let late_a = OrderKey {
            timestamp: Timestamp::from_millis(20),
            device: a,
            seq: 0,
        };
        let tie_a = OrderKey {
            timestamp: Timestamp::from_millis(10),
            device: a,
            seq: 9,
        };

        let mut keys = vec![late_a, early_b, tie_a];
        keys.sort();
        assert_eq!(keys, vec![tie_a, early_b, late_a]);
    }

    #[test]
    fn device_id_parses_its_display() {
        let id = DeviceId::generate();
        let parsed: DeviceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn item_key_display() {
        assert_eq!(ItemKey::lexeme("casa").to_string(), "lexeme:casa");
        assert_eq!(Timestamp::from_millis(5).to_string(), "5ms");
    }

    #[test]
    fn day_index_boundaries() {
        assert_eq!(Timestamp::from_millis(Timestamp::DAY_MS - 1).day_index(), 0);
        assert_eq!(Timestamp::from_millis(Timestamp::DAY_MS).day_index(), 1);
    }
}
