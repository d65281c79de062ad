//! Event log durability and ordering tests against real files.

use proptest::prelude::*;
use tempfile::tempdir;
use weapon_core::{
    DataDir, DeviceId, Event, EventId, EventLog, EventPayload, ItemKey, LogConfig, LogError,
    Rating, FILE_HEADER_SIZE, SyncCheckpoint, Timestamp, VectorClock,
};
use weapon_storage::{FileBackend, InMemoryBackend, StorageBackend};

fn dev(n: u8) -> DeviceId {
    DeviceId::from_bytes([n; 16])
}

fn review(device: DeviceId, seq: u64, at: u64, rating: Rating) -> Event {
    Event::new(
        EventId::new(device, seq),
        Timestamp::from_millis(at),
        EventPayload::Review {
            key: ItemKey::lexeme("casa"),
            rating,
        },
    )
}

fn open_file_log(dir: &DataDir) -> EventLog {
    let backend = FileBackend::open(&dir.log_path()).unwrap();
    EventLog::open(Box::new(backend), LogConfig::default()).unwrap()
}

#[test]
fn events_and_checkpoints_survive_restart() {
    let tmp = tempdir().unwrap();

    {
        let dir = DataDir::open(tmp.path(), true).unwrap();
        let mut log = open_file_log(&dir);
        log.append(review(dev(1), 0, 1_000, Rating::Good)).unwrap();
        log.append(review(dev(1), 1, 2_000, Rating::Again)).unwrap();

        let mut cp = SyncCheckpoint::new("backend1");
        cp.acknowledged.set(dev(1), 1);
        cp.last_sync_finished = Some(Timestamp::from_millis(1_500));
        log.record_checkpoint(cp).unwrap();
    }

    let dir = DataDir::open(tmp.path(), true).unwrap();
    let log = open_file_log(&dir);
    assert_eq!(log.count(), 2);
    assert_eq!(log.next_seq(&dev(1)), 2);
    let cp = log.checkpoint("backend1").unwrap();
    assert_eq!(cp.acknowledged.get(&dev(1)), 1);
    assert_eq!(
        log.earliest_not_covered_by(&cp.acknowledged).unwrap().id,
        EventId::new(dev(1), 1)
    );
}

#[test]
fn repeated_checkpoints_do_not_grow_file_across_restarts() {
    let tmp = tempdir().unwrap();
    let dir = DataDir::open(tmp.path(), true).unwrap();
    let mut cp = SyncCheckpoint::new("backend1");

    {
        let mut log = open_file_log(&dir);
        log.append(review(dev(1), 0, 1_000, Rating::Good)).unwrap();
        cp.last_sync_started = Some(Timestamp::from_millis(2_000));
        log.record_checkpoint(cp.clone()).unwrap();
    }
    let size = std::fs::metadata(dir.log_path()).unwrap().len();

    for round in 0..3u64 {
        let mut log = open_file_log(&dir);
        cp.last_sync_started = Some(Timestamp::from_millis(3_000 + round));
        cp.last_sync_finished = Some(Timestamp::from_millis(3_500 + round));
        log.record_checkpoint(cp.clone()).unwrap();
        assert_eq!(log.stats().unwrap().checkpoint_records, 1);
    }

    let log = open_file_log(&dir);
    assert_eq!(log.count(), 1);
    assert_eq!(log.checkpoint("backend1"), Some(&cp));
    let grown = std::fs::metadata(dir.log_path()).unwrap().len();
    assert!(grown < size + 32, "{grown} vs {size}");
}

#[test]
fn torn_tail_is_truncated_and_prior_events_kept() {
    let backend = InMemoryBackend::new();
    let shared = backend.clone();

    {
        let mut log = EventLog::open(Box::new(backend.clone()), LogConfig::default()).unwrap();
        log.append(review(dev(1), 0, 1_000, Rating::Good)).unwrap();
        log.append(review(dev(1), 1, 2_000, Rating::Good)).unwrap();
    }
    let intact_len = shared.size().unwrap();

    {
        let mut log = EventLog::open(Box::new(backend.clone()), LogConfig::default()).unwrap();
        log.append(review(dev(1), 2, 3_000, Rating::Easy)).unwrap();
    }
    // crash halfway through the third record
    let third_len = shared.size().unwrap() - intact_len;
    shared.tear_tail((third_len / 2) as usize);

    let mut log = EventLog::open(Box::new(backend), LogConfig::default()).unwrap();
    assert_eq!(log.count(), 2);
    assert_eq!(shared.size().unwrap(), intact_len);
    assert!(log.stats().unwrap().repaired_tail_bytes > 0);

    // the log accepts the lost event again
    log.append(review(dev(1), 2, 3_000, Rating::Easy)).unwrap();
    assert_eq!(log.count(), 3);
}

#[test]
fn checksum_damage_is_fatal() {
    let backend = InMemoryBackend::new();
    {
        let mut log = EventLog::open(Box::new(backend.clone()), LogConfig::default()).unwrap();
        log.append(review(dev(1), 0, 1_000, Rating::Good)).unwrap();
        log.append(review(dev(1), 1, 2_000, Rating::Good)).unwrap();
    }

    // inside the first record's payload
    let mut bytes = backend.snapshot();
    bytes[FILE_HEADER_SIZE + 20] ^= 0xFF;

    let damaged = InMemoryBackend::with_data(bytes);
    let err = EventLog::open(Box::new(damaged), LogConfig::default()).unwrap_err();
    assert!(matches!(err, LogError::ChecksumMismatch { .. }));
}

#[test]
fn damaged_length_in_earlier_record_is_fatal_and_keeps_file() {
    let backend = InMemoryBackend::new();
    {
        let mut log = EventLog::open(Box::new(backend.clone()), LogConfig::default()).unwrap();
        for seq in 0..3 {
            log.append(review(dev(1), seq, 1_000 * (seq + 1), Rating::Good))
                .unwrap();
        }
    }

    // high byte of the first record's length field
    let mut bytes = backend.snapshot();
    bytes[FILE_HEADER_SIZE + 10] ^= 0xFF;
    let original_len = bytes.len() as u64;

    let damaged = InMemoryBackend::with_data(bytes);
    let err = EventLog::open(Box::new(damaged.clone()), LogConfig::default()).unwrap_err();
    assert!(matches!(err, LogError::ChecksumMismatch { .. }));
    assert_eq!(damaged.size().unwrap(), original_len);
}

#[test]
fn foreign_file_is_rejected() {
    let backend = InMemoryBackend::with_data(b"definitely not an event log".to_vec());
    assert!(matches!(
        EventLog::open(Box::new(backend), LogConfig::default()),
        Err(LogError::Corruption { .. })
    ));
}

#[test]
fn rejected_event_never_reaches_storage() {
    let backend = InMemoryBackend::new();
    let shared = backend.clone();
    let mut log = EventLog::open(Box::new(backend), LogConfig::default()).unwrap();
    let size = shared.size().unwrap();

    let bad = Event::new(
        EventId::new(dev(1), 0),
        Timestamp::from_millis(10),
        EventPayload::Review {
            key: ItemKey::lexeme(""),
            rating: Rating::Good,
        },
    );
    assert!(log.append(bad).is_err());
    assert_eq!(shared.size().unwrap(), size);
}

fn device_streams() -> impl Strategy<Value = Vec<Event>> {
    // up to three devices, each with a gap-free run of reviews at arbitrary times
    prop::collection::vec(prop::collection::vec(1u64..10_000, 0..8), 1..4).prop_map(|runs| {
        let mut events = Vec::new();
        for (d, times) in runs.into_iter().enumerate() {
            for (seq, at) in times.into_iter().enumerate() {
                events.push(review(dev(d as u8 + 1), seq as u64, at, Rating::Good));
            }
        }
        events
    })
}

proptest! {
    #[test]
    fn iteration_order_ignores_interleaving(events in device_streams(), seed in any::<u64>()) {
        let mut in_order = EventLog::in_memory().unwrap();
        for event in &events {
            in_order.append(event.clone()).unwrap();
        }

        // interleave devices differently while keeping each device's seq order
        let mut shuffled = EventLog::in_memory().unwrap();
        let mut queues: Vec<Vec<Event>> = Vec::new();
        for event in &events {
            let d = event.id.device.as_bytes()[0] as usize - 1;
            if queues.len() <= d {
                queues.resize(d + 1, Vec::new());
            }
            queues[d].push(event.clone());
        }
        for q in &mut queues {
            q.reverse();
        }
        let mut pick = seed;
        while queues.iter().any(|q| !q.is_empty()) {
            let live: Vec<usize> = (0..queues.len()).filter(|i| !queues[*i].is_empty()).collect();
            let i = live[(pick % live.len() as u64) as usize];
            pick = pick.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let event = queues[i].pop().unwrap();
            shuffled.append(event).unwrap();
        }

        let a: Vec<EventId> = in_order.iterate(None).unwrap().map(|e| e.id).collect();
        let b: Vec<EventId> = shuffled.iterate(None).unwrap().map(|e| e.id).collect();
        prop_assert_eq!(a, b);

        let mut full = VectorClock::new();
        full.merge(shuffled.device_clock());
        prop_assert_eq!(full.total(), events.len() as u64);
    }
}
