//! Deck-wide counters.

use serde::Serialize;
use std::collections::BTreeSet;
use weapon_core::Timestamp;

/// Summary numbers for a deck at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeckStats {
    /// Reviews ever recorded.
    pub total_reviews: u64,
    /// Consecutive UTC days with a review, ending today or yesterday.
    pub daily_streak: u32,
    /// Known cards.
    pub cards: usize,
    /// Cards due now.
    pub due_count: usize,
    /// Current leeches.
    pub leech_count: usize,
}

/// Length of the run of consecutive review days ending today or yesterday.
///
/// A streak survives until the end of the day after the last review.
#[must_use]
pub fn daily_streak(review_days: &BTreeSet<u64>, now: Timestamp) -> u32 {
    let today = now.day_index();
    let Some(&last) = review_days.range(..=today).next_back() else {
        return 0;
    };
    if today - last > 1 {
        return 0;
    }

    let mut streak = 0;
    let mut expected = last;
    for &day in review_days.range(..=last).rev() {
        if day != expected {
            break;
        }
        streak += 1;
        match expected.checked_sub(1) {
            Some(prev) => expected = prev,
            None => break,
        }
    }
    streak
}
