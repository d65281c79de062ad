//! Per-card derived state and the transition function that folds events
//! into it.

use crate::leech::{LeechPolicy, RecentOutcomes};
use crate::scheduler::{CardState, Memory, Scheduler};
use serde::Serialize;
use weapon_core::{CardEdit, Event, EventPayload, ItemKey, SettingChange, Timestamp};

/// Current state of one card, derived entirely from its events.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemState {
    /// Card identity.
    pub key: ItemKey,
    /// Reviews folded in, including those while suspended.
    pub review_count: u32,
    /// Transitions into `Relearning`.
    pub lapse_count: u32,
    /// When the card is next due, in epoch ms.
    pub due_timestamp_ms: u64,
    /// Scheduling state.
    pub state: CardState,
    /// Time of the most recent review.
    pub last_reviewed_at: Option<Timestamp>,
    /// Scheduler memory carried between reviews.
    pub memory: Memory,
    /// State to return to on unsuspend.
    pub suspended_from: Option<CardState>,
    /// Lapse history inside the leech window.
    pub recent: RecentOutcomes,
}

impl ItemState {
    /// A card nobody has touched.
    #[must_use]
    pub fn new(key: ItemKey) -> Self {
        Self {
            key,
            review_count: 0,
            lapse_count: 0,
            due_timestamp_ms: 0,
            state: CardState::New,
            last_reviewed_at: None,
            memory: Memory::default(),
            suspended_from: None,
            recent: RecentOutcomes::default(),
        }
    }

    /// Returns true if the card is in rotation and due at or before `now`.
    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.state != CardState::Suspended
            && self.state != CardState::New
            && self.due_timestamp_ms <= now.as_millis()
    }

    /// Plain-data summary for views.
    #[must_use]
    pub fn summary(&self) -> CardSummary {
        CardSummary {
            key: self.key.clone(),
            state: self.state,
            due_timestamp_ms: self.due_timestamp_ms,
            review_count: self.review_count,
            lapse_count: self.lapse_count,
        }
    }
}

/// Renderable subset of an [`ItemState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardSummary {
    /// Card identity.
    pub key: ItemKey,
    /// Scheduling state.
    pub state: CardState,
    /// Next due time in epoch ms.
    pub due_timestamp_ms: u64,
    /// Reviews so far.
    pub review_count: u32,
    /// Lapses so far.
    pub lapse_count: u32,
}

/// Folds one event into the state of `state.key`.
///
/// Events that do not concern the key leave it untouched. Callers must feed
/// events in canonical order; the result is then a pure function of that
/// sequence.
pub fn apply_event<S: Scheduler + ?Sized>(
    state: &mut ItemState,
    event: &Event,
    scheduler: &S,
    policy: &LeechPolicy,
) {
    match &event.payload {
        EventPayload::Review { key, rating } if *key == state.key => {
            state.review_count += 1;
            if state.state == CardState::Suspended {
                state.last_reviewed_at = Some(event.timestamp);
                return;
            }

            let from = state.state;
            let next = scheduler.schedule(state, *rating, event.timestamp);
            let lapse = next.state == CardState::Relearning && !rating.is_success();
            if lapse {
                state.lapse_count += 1;
            }
            if from != next.state {
                tracing::trace!(key = %state.key, from = from.as_str(), to = next.state.as_str(), "card transition");
            }

            state.state = next.state;
            state.due_timestamp_ms = next.due.as_millis();
            state.memory = next.memory;
            state.last_reviewed_at = Some(event.timestamp);
            state.recent.push(lapse, policy.window);
        }
        EventPayload::CardEdit(CardEdit::Add { keys }) if keys.contains(&state.key) => {
            if state.state == CardState::New && state.due_timestamp_ms == 0 {
                state.due_timestamp_ms = event.timestamp.as_millis();
            }
        }
        EventPayload::CardEdit(CardEdit::Reset { key }) if *key == state.key => {
            let key = state.key.clone();
            *state = ItemState::new(key);
            state.due_timestamp_ms = event.timestamp.as_millis();
        }
        EventPayload::SettingChange(SettingChange::Suspend { key }) if *key == state.key => {
            if state.state != CardState::Suspended {
                state.suspended_from = Some(state.state);
                state.state = CardState::Suspended;
            }
        }
        EventPayload::SettingChange(SettingChange::Unsuspend { key }) if *key == state.key => {
            if let Some(prior) = state.suspended_from.take() {
                state.state = prior;
            }
        }
        _ => {}
    }
}

/// Folds `events` from scratch into the state of `key`.
pub fn fold<'a, S, I>(key: &ItemKey, events: I, scheduler: &S, policy: &LeechPolicy) -> ItemState
where
    S: Scheduler + ?Sized,
    I: IntoIterator<Item = &'a Event>,
{
    let mut state = ItemState::new(key.clone());
    for event in events {
        apply_event(&mut state, event, scheduler, policy);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::FsrsScheduler;
    use weapon_core::{DeviceId, EventId, Rating};

    fn ev(seq: u64, at: u64, payload: EventPayload) -> Event {
        Event::new(
            EventId::new(DeviceId::from_bytes([1; 16]), seq),
            Timestamp::from_millis(at),
            payload,
        )
    }

    fn review(seq: u64, at: u64, rating: Rating) -> Event {
        ev(
            seq,
            at,
            EventPayload::Review {
                key: ItemKey::lexeme("casa"),
                rating,
            },
        )
    }

    #[test]
    fn suspend_returns_to_prior_state() {
        let key = ItemKey::lexeme("casa");
        let events = vec![
            review(0, 1_000, Rating::Good),
            ev(1, 2_000, EventPayload::SettingChange(SettingChange::Suspend { key: key.clone() })),
            review(2, 3_000, Rating::Again),
            ev(3, 4_000, EventPayload::SettingChange(SettingChange::Unsuspend { key: key.clone() })),
        ];
        let scheduler = FsrsScheduler::default();
        let policy = LeechPolicy::default();

        let suspended = fold(&key, &events[..3], &scheduler, &policy);
        assert_eq!(suspended.state, CardState::Suspended);
        assert_eq!(suspended.review_count, 2);
        assert_eq!(suspended.lapse_count, 0);

        let resumed = fold(&key, &events, &scheduler, &policy);
        assert_eq!(resumed.state, CardState::Learning);
    }

    #[test]
    fn lapse_counts_every_entry_into_relearning() {
        let key = ItemKey::lexeme("casa");
        let events = vec![
            review(0, 1_000, Rating::Good),
            review(1, 2_000, Rating::Good),
            review(2, 3_000, Rating::Again),
            review(3, 4_000, Rating::Again),
            review(4, 5_000, Rating::Good),
        ];
        let state = fold(&key, &events, &FsrsScheduler::default(), &LeechPolicy::default());
        assert_eq!(state.lapse_count, 2);
        assert_eq!(state.state, CardState::Review);
        assert_eq!(state.review_count, 5);
    }

    #[test]
    fn reset_forgets_history() {
        let key = ItemKey::lexeme("casa");
        let events = vec![
            review(0, 1_000, Rating::Good),
            review(1, 2_000, Rating::Good),
            review(2, 3_000, Rating::Again),
            ev(3, 4_000, EventPayload::CardEdit(CardEdit::Reset { key: key.clone() })),
        ];
        let state = fold(&key, &events, &FsrsScheduler::default(), &LeechPolicy::default());
        assert_eq!(state.state, CardState::New);
        assert_eq!(state.lapse_count, 0);
        assert!(state.recent.is_empty());
        assert_eq!(state.due_timestamp_ms, 4_000);
    }

    #[test]
    fn other_keys_are_ignored() {
        let key = ItemKey::lexeme("perro");
        let events = vec![review(0, 1_000, Rating::Again)];
        let state = fold(&key, &events, &FsrsScheduler::default(), &LeechPolicy::default());
        assert_eq!(state, ItemState::new(key));
    }

    #[test]
    fn add_sets_due_for_new_cards() {
        let key = ItemKey::lexeme("casa");
        let events = vec![ev(
            0,
            7_000,
            EventPayload::CardEdit(CardEdit::Add {
                keys: vec![key.clone()],
            }),
        )];
        let state = fold(&key, &events, &FsrsScheduler::default(), &LeechPolicy::default());
        assert_eq!(state.state, CardState::New);
        assert_eq!(state.due_timestamp_ms, 7_000);
        assert!(!state.is_due(Timestamp::from_millis(10_000)));
    }
}
