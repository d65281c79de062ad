//! Learning events and their validation.

use crate::error::ValidationError;
use crate::types::{EventId, ItemKey, OrderKey, Timestamp};
use serde::{Deserialize, Serialize};

/// Longest accepted card text, in bytes.
const MAX_KEY_LEN: usize = 512;

/// Outcome of one review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    /// Forgotten. The only failing grade.
    Again,
    /// Recalled with difficulty.
    Hard,
    /// Recalled.
    Good,
    /// Recalled effortlessly.
    Easy,
}

impl Rating {
    /// Returns true for every grade except [`Rating::Again`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        !matches!(self, Self::Again)
    }
}

/// Card-level edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardEdit {
    /// Adds cards to the deck as `New`.
    Add {
        /// Cards to add.
        keys: Vec<ItemKey>,
    },
    /// Forgets all review history of a card.
    Reset {
        /// Card to reset.
        key: ItemKey,
    },
}

/// Per-card settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingChange {
    /// Takes a card out of rotation.
    Suspend {
        /// Card to suspend.
        key: ItemKey,
    },
    /// Puts a suspended card back where it was.
    Unsuspend {
        /// Card to unsuspend.
        key: ItemKey,
    },
}

/// What happened. Adding a variant forces every projector match to handle it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    /// A card was reviewed.
    Review {
        /// Reviewed card.
        key: ItemKey,
        /// Outcome.
        rating: Rating,
    },
    /// A card was edited.
    CardEdit(CardEdit),
    /// A card setting changed.
    SettingChange(SettingChange),
}

impl EventPayload {
    /// Cards whose state this payload can change.
    #[must_use]
    pub fn keys(&self) -> Vec<&ItemKey> {
        match self {
            Self::Review { key, .. }
            | Self::CardEdit(CardEdit::Reset { key })
            | Self::SettingChange(SettingChange::Suspend { key })
            | Self::SettingChange(SettingChange::Unsuspend { key }) => vec![key],
            Self::CardEdit(CardEdit::Add { keys }) => keys.iter().collect(),
        }
    }

    /// Short label for logs and text dumps.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Review { .. } => "review",
            Self::CardEdit(CardEdit::Add { .. }) => "add",
            Self::CardEdit(CardEdit::Reset { .. }) => "reset",
            Self::SettingChange(SettingChange::Suspend { .. }) => "suspend",
            Self::SettingChange(SettingChange::Unsuspend { .. }) => "unsuspend",
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Self::CardEdit(CardEdit::Add { keys }) = self {
            if keys.is_empty() {
                return Err(ValidationError::EmptyCardList);
            }
        }
        for key in self.keys() {
            if key.text.trim().is_empty() {
                return Err(ValidationError::EmptyKey);
            }
            if key.text.len() > MAX_KEY_LEN {
                return Err(ValidationError::KeyTooLong {
                    len: key.text.len(),
                    max: MAX_KEY_LEN,
                });
            }
        }
        Ok(())
    }
}

/// An immutable, committed fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique identity.
    pub id: EventId,
    /// Wall-clock time on the originating device.
    pub timestamp: Timestamp,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Creates an event.
    #[must_use]
    pub const fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }

    /// Canonical ordering position.
    #[must_use]
    pub const fn order_key(&self) -> OrderKey {
        OrderKey {
            timestamp: self.timestamp,
            device: self.id.device,
            seq: self.id.seq,
        }
    }

    /// Checks structural validity.
    ///
    /// # Errors
    ///
    /// Returns the first rule the event breaks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timestamp.as_millis() == 0 {
            return Err(ValidationError::ZeroTimestamp);
        }
        self.payload.validate()
    }
}
