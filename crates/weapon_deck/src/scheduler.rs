//! Scheduling: the pure function from a review to the next state and due time.

use crate::error::{DeckError, DeckResult};
use crate::item::ItemState;
use chrono::{DateTime, Utc};
use rs_fsrs::{Card, Parameters, FSRS};
use serde::{Deserialize, Serialize};
use weapon_core::{Rating, Timestamp};

/// Scheduling state of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardState {
    /// Never reviewed.
    New,
    /// Working through the initial learning steps.
    Learning,
    /// Graduated; reviewed at growing intervals.
    Review,
    /// Forgotten after graduating; back on short steps.
    Relearning,
    /// Out of rotation until unsuspended.
    Suspended,
}

impl CardState {
    /// Lowercase name for display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
            Self::Suspended => "suspended",
        }
    }
}

// FSRS forgetting curve: R(t) = (1 + FACTOR * t / S) ^ DECAY, so R(S) = 0.9.
const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;

/// Memory model carried between reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Days after which recall probability falls to 90%.
    pub stability: f64,
    /// Intrinsic difficulty, 1 (easy) to 10 (hard).
    pub difficulty: f64,
    /// Whole days between the last two reviews.
    pub elapsed_days: u64,
    /// Whole days scheduled after the last review.
    pub scheduled_days: u64,
    /// Reviews the scheduler has seen.
    pub reps: u32,
    /// Failures the scheduler has seen in review.
    pub lapses: u32,
}

impl Memory {
    /// Probability of recall `elapsed_ms` after the last review.
    ///
    /// Zero while the card has no stability yet.
    #[must_use]
    pub fn retrievability(&self, elapsed_ms: u64) -> f64 {
        if self.stability <= 0.0 {
            return 0.0;
        }
        let days = elapsed_ms as f64 / Timestamp::DAY_MS as f64;
        (1.0 + FACTOR * days / self.stability).powf(DECAY)
    }
}

/// Output of one scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    /// State after the review.
    pub state: CardState,
    /// When the card is next due.
    pub due: Timestamp,
    /// Memory to carry into the next review.
    pub memory: Memory,
}

/// Turns a review outcome into the next state and due time.
///
/// Implementations must be pure: the same `(current, rating, at)` always
/// yields the same [`Schedule`]. Multi-device convergence depends on it.
pub trait Scheduler: Send + Sync {
    /// Schedules `current` after a review rated `rating` at time `at`.
    ///
    /// `current` still holds the previous review time in `last_reviewed_at`.
    /// It is never `Suspended`; the projector handles suspension itself.
    fn schedule(&self, current: &ItemState, rating: Rating, at: Timestamp) -> Schedule;
}

/// Tunables for [`FsrsScheduler`].
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Recall probability the scheduler aims for when a card comes due.
    pub request_retention: f64,
    /// Longest interval handed out, in days.
    pub maximum_interval_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            request_retention: 0.9,
            maximum_interval_days: 36_500,
        }
    }
}

impl SchedulerConfig {
    /// Sets the target retention.
    #[must_use]
    pub fn with_request_retention(mut self, retention: f64) -> Self {
        self.request_retention = retention;
        self
    }

    /// Sets the interval cap.
    #[must_use]
    pub fn with_maximum_interval_days(mut self, days: u32) -> Self {
        self.maximum_interval_days = days;
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::InvalidScheduler`] for a retention outside
    /// `(0, 1)` or a zero interval cap.
    pub fn validate(&self) -> DeckResult<()> {
        if !(self.request_retention > 0.0 && self.request_retention < 1.0) {
            return Err(DeckError::InvalidScheduler(format!(
                "request retention {} is not in (0, 1)",
                self.request_retention
            )));
        }
        if self.maximum_interval_days == 0 {
            return Err(DeckError::InvalidScheduler(
                "maximum interval must be at least one day".into(),
            ));
        }
        Ok(())
    }
}

/// FSRS scheduler backed by `rs-fsrs`, without fuzz so results are
/// reproducible on every replica.
pub struct FsrsScheduler {
    config: SchedulerConfig,
    fsrs: FSRS,
}

impl FsrsScheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: SchedulerConfig) -> DeckResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SchedulerConfig) -> Self {
        let fsrs = FSRS::new(Parameters {
            request_retention: config.request_retention,
            maximum_interval: config.maximum_interval_days as _,
            ..Default::default()
        });
        Self { config, fsrs }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn card(current: &ItemState, at: DateTime<Utc>) -> Card {
        let memory = &current.memory;
        let mut card = Card::new();
        card.due = to_datetime(Timestamp::from_millis(current.due_timestamp_ms));
        card.last_review = current.last_reviewed_at.map_or(at, to_datetime);
        card.stability = memory.stability;
        card.difficulty = memory.difficulty;
        card.elapsed_days = memory.elapsed_days as _;
        card.scheduled_days = memory.scheduled_days as _;
        card.reps = memory.reps as _;
        card.lapses = memory.lapses as _;
        card.state = match current.state {
            CardState::New => rs_fsrs::State::New,
            CardState::Learning => rs_fsrs::State::Learning,
            CardState::Review => rs_fsrs::State::Review,
            CardState::Relearning => rs_fsrs::State::Relearning,
            // the projector never schedules a suspended card
            CardState::Suspended => rs_fsrs::State::Review,
        };
        card
    }
}

impl Default for FsrsScheduler {
    fn default() -> Self {
        Self::build(SchedulerConfig::default())
    }
}

impl std::fmt::Debug for FsrsScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsrsScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Scheduler for FsrsScheduler {
    fn schedule(&self, current: &ItemState, rating: Rating, at: Timestamp) -> Schedule {
        let now = to_datetime(at);
        let rating = match rating {
            Rating::Again => rs_fsrs::Rating::Again,
            Rating::Hard => rs_fsrs::Rating::Hard,
            Rating::Good => rs_fsrs::Rating::Good,
            Rating::Easy => rs_fsrs::Rating::Easy,
        };
        let next = self.fsrs.next(Self::card(current, now), now, rating).card;

        let state = match next.state {
            rs_fsrs::State::New => CardState::New,
            rs_fsrs::State::Learning => CardState::Learning,
            rs_fsrs::State::Review => CardState::Review,
            rs_fsrs::State::Relearning => CardState::Relearning,
        };
        Schedule {
            state,
            due: Timestamp::from_millis(u64::try_from(next.due.timestamp_millis()).unwrap_or(0)),
            memory: Memory {
                stability: next.stability,
                difficulty: next.difficulty,
                elapsed_days: u64::try_from(next.elapsed_days).unwrap_or(0),
                scheduled_days: u64::try_from(next.scheduled_days).unwrap_or(0),
                reps: u32::try_from(next.reps).unwrap_or(u32::MAX),
                lapses: u32::try_from(next.lapses).unwrap_or(u32::MAX),
            },
        }
    }
}

fn to_datetime(at: Timestamp) -> DateTime<Utc> {
    let millis = i64::try_from(at.as_millis()).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}
