//! End-to-end request handling through the CBOR router.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use weapon_core::{
    DeviceId, Event, EventId, EventPayload, ItemKey, ManualClock, Rating, Timestamp, VectorClock,
};
use weapon_sync_protocol::{
    endpoints, Credentials, HandshakeRequest, HandshakeResponse, PullRequest, PullResponse,
    PushRequest, PushResponse, RejectionCode, Reply, Wire,
};
use weapon_sync_server::{EventStore, ServerConfig, SyncServer};

fn review(device: DeviceId, seq: u64) -> Event {
    Event::new(
        EventId::new(device, seq),
        Timestamp::from_millis(10_000 + seq),
        EventPayload::Review {
            key: ItemKey::lexeme("casa"),
            rating: Rating::Good,
        },
    )
}

fn call<Req: Wire, Res: Wire>(server: &SyncServer, path: &str, req: &Req) -> Reply<Res> {
    let body = req.encode().unwrap();
    Reply::decode(&server.route(path, &body).unwrap()).unwrap()
}

#[test]
fn expired_token_is_a_terminal_rejection() {
    let clock = Arc::new(ManualClock::with_step(1_000_000, 0));
    let config = ServerConfig::default()
        .with_auth(b"server-secret".to_vec())
        .with_token_expiry(Duration::from_secs(3600));
    let server = SyncServer::with_clock(config, clock.clone());
    let device = DeviceId::from_bytes([9; 16]);

    let token = server.issue_token("user-1", device).unwrap();
    let creds = Credentials::new("user-1", device).with_token(token);

    let ok: Reply<HandshakeResponse> =
        call(&server, endpoints::HANDSHAKE, &HandshakeRequest::new(creds.clone()));
    assert!(ok.into_result().is_ok());

    clock.advance(3_600_001);
    let expired: Reply<PushResponse> = call(
        &server,
        endpoints::PUSH,
        &PushRequest {
            credentials: creds,
            events: vec![review(device, 0)],
        },
    );
    let err = expired.into_result().unwrap_err();
    assert_eq!(err.code, RejectionCode::TokenExpired);
    assert!(!err.code.is_retryable());
    assert_eq!(server.event_count("user-1"), 0);
}

#[test]
fn two_devices_share_one_user_stream() {
    let server = SyncServer::new(ServerConfig::default().with_max_pull_batch(3));
    let a = DeviceId::from_bytes([1; 16]);
    let b = DeviceId::from_bytes([2; 16]);

    for (device, n) in [(a, 4u64), (b, 2)] {
        let reply: Reply<PushResponse> = call(
            &server,
            endpoints::PUSH,
            &PushRequest {
                credentials: Credentials::new("user-1", device),
                events: (0..n).map(|seq| review(device, seq)).collect(),
            },
        );
        reply.into_result().unwrap();
    }
    let other: Reply<PushResponse> = call(
        &server,
        endpoints::PUSH,
        &PushRequest {
            credentials: Credentials::new("user-2", a),
            events: vec![review(a, 0)],
        },
    );
    assert_eq!(other.into_result().unwrap().event_count, 1);

    let mut since = VectorClock::new();
    since.set(b, 2);
    let mut collected = Vec::new();
    loop {
        let reply: Reply<PullResponse> = call(
            &server,
            endpoints::PULL,
            &PullRequest {
                credentials: Credentials::new("user-1", b),
                since: since.clone(),
                limit: 100,
            },
        );
        let page = reply.into_result().unwrap();
        for event in &page.events {
            since.observe(event.id);
        }
        collected.extend(page.events);
        if !page.has_more {
            assert_eq!(page.event_count, 6);
            break;
        }
    }
    assert_eq!(collected.len(), 4);
    assert!(collected.iter().all(|e| e.id.device == a));
}

proptest! {
    /// Resending overlapping prefixes in any batch sizes stores each event
    /// once, and paging from an empty clock returns each exactly once.
    #[test]
    fn resent_batches_store_and_page_each_event_once(
        counts in prop::collection::vec(1u64..12, 1..4),
        cuts in prop::collection::vec(1usize..6, 1..12),
        limit in 1u32..7,
    ) {
        let store = EventStore::new();
        let devices: Vec<DeviceId> = (0..counts.len())
            .map(|d| DeviceId::from_bytes([d as u8 + 1; 16]))
            .collect();
        let total: u64 = counts.iter().sum();

        for (device, &n) in devices.iter().zip(&counts) {
            let events: Vec<Event> = (0..n).map(|seq| review(*device, seq)).collect();
            // every cut resends the stream from its start up to the cut
            let mut stored = 0u64;
            for cut in &cuts {
                let end = (*cut).min(events.len());
                stored += u64::from(store.append("user-1", &events[..end]).unwrap().stored);
            }
            stored += u64::from(store.append("user-1", &events).unwrap().stored);
            prop_assert_eq!(stored, n);
        }
        prop_assert_eq!(store.count("user-1"), total);
        for (device, &n) in devices.iter().zip(&counts) {
            prop_assert_eq!(store.clock("user-1").get(device), n);
        }

        let mut since = VectorClock::new();
        let mut seen = Vec::new();
        loop {
            let (page, has_more) = store.events_since("user-1", &since, limit);
            prop_assert!(page.len() <= limit as usize);
            for event in &page {
                since.observe(event.id);
                seen.push(event.id);
            }
            if !has_more {
                break;
            }
        }
        prop_assert_eq!(seen.len() as u64, total);
        seen.sort();
        seen.dedup();
        prop_assert_eq!(seen.len() as u64, total);
    }
}
