//! Leech detection.

use crate::error::{DeckError, DeckResult};
use std::collections::VecDeque;

/// When a card counts as a leech.
///
/// A card is a leech when more than `lapse_threshold` of its last `window`
/// reviews were lapses. Old lapses fall out of the window, so a card that
/// recovers stops being a leech without any explicit expiry.
///
/// A lapse is a failed review that sends the card to `Relearning`, so only
/// cards that have graduated once can lapse. Failures while still in
/// `Learning` count as non-lapse reviews in the window: a card that never
/// graduates is never a leech, however often it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeechPolicy {
    /// Lapses in the window that must be exceeded.
    pub lapse_threshold: u32,
    /// Number of most recent reviews considered.
    pub window: usize,
}

impl Default for LeechPolicy {
    fn default() -> Self {
        Self {
            lapse_threshold: 4,
            window: 8,
        }
    }
}

impl LeechPolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::EmptyLeechWindow`] if `window` is zero.
    pub fn new(lapse_threshold: u32, window: usize) -> DeckResult<Self> {
        if window == 0 {
            return Err(DeckError::EmptyLeechWindow);
        }
        Ok(Self {
            lapse_threshold,
            window,
        })
    }

    /// Applies the predicate to a card's recent outcomes.
    #[must_use]
    pub fn is_leech(&self, recent: &RecentOutcomes) -> bool {
        recent.lapses() > self.lapse_threshold
    }
}

/// Bounded record of a card's most recent reviews, `true` marking a lapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentOutcomes {
    outcomes: VecDeque<bool>,
    lapses: u32,
}

impl RecentOutcomes {
    /// Records one review, evicting the oldest beyond `window`.
    pub fn push(&mut self, lapse: bool, window: usize) {
        self.outcomes.push_back(lapse);
        if lapse {
            self.lapses += 1;
        }
        while self.outcomes.len() > window {
            if self.outcomes.pop_front() == Some(true) {
                self.lapses -= 1;
            }
        }
    }

    /// Lapses currently in the window.
    #[must_use]
    pub const fn lapses(&self) -> u32 {
        self.lapses
    }

    /// Reviews currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if no review is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.outcomes.clear();
        self.lapses = 0;
    }
}
