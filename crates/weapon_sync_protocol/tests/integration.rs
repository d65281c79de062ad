//! Wire compatibility of protocol messages.

use proptest::prelude::*;
use weapon_core::{DeviceId, Event, EventId, EventPayload, ItemKey, Rating, Timestamp, VectorClock};
use weapon_sync_protocol::{
    Credentials, PullRequest, PullResponse, Reply, Wire,
};

fn event_strategy() -> impl Strategy<Value = Event> {
    (any::<[u8; 16]>(), 0u64..1_000, 1u64..u64::MAX / 2, "[a-z]{1,12}", 0u8..4).prop_map(
        |(device, seq, at, word, grade)| {
            let rating = match grade {
                0 => Rating::Again,
                1 => Rating::Hard,
                2 => Rating::Good,
                _ => Rating::Easy,
            };
            Event::new(
                EventId::new(DeviceId::from_bytes(device), seq),
                Timestamp::from_millis(at),
                EventPayload::Review {
                    key: ItemKey::lexeme(word),
                    rating,
                },
            )
        },
    )
}

proptest! {
    #[test]
    fn pull_pages_survive_the_wire(events in prop::collection::vec(event_strategy(), 0..20), has_more: bool) {
        let mut clock = VectorClock::new();
        for event in &events {
            clock.observe(event.id);
        }
        let page = PullResponse {
            event_count: events.len() as u64,
            events,
            has_more,
            remote_clock: clock,
        };
        let bytes = Reply::Ok(page.clone()).encode().unwrap();
        let decoded = Reply::<PullResponse>::decode(&bytes).unwrap().into_result().unwrap();
        prop_assert_eq!(decoded, page);
    }
}

#[test]
fn request_body_is_not_a_response() {
    let req = PullRequest {
        credentials: Credentials::new("u", DeviceId::from_bytes([1; 16])),
        since: VectorClock::new(),
        limit: 10,
    };
    let bytes = req.encode().unwrap();
    assert!(Reply::<PullResponse>::decode(&bytes).is_err());
}
