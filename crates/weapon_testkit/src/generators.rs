//! Property-based test generators using proptest.
//!
//! Streams keep per-device seqs gap-free so every generated event is
//! appendable; timestamps are arbitrary, so streams from different devices
//! interleave in canonical order.

use proptest::prelude::*;
use weapon_core::{
    CardEdit, DeviceId, Event, EventId, EventPayload, ItemKey, ItemKind, Rating, SettingChange,
    Timestamp,
};

/// Words drawn by [`item_key_strategy`]; small, so keys collide often.
pub const WORDS: &[&str] = &["casa", "perro", "gato", "libro", "agua"];

/// Strategy for device ids.
pub fn device_id_strategy() -> impl Strategy<Value = DeviceId> {
    prop::array::uniform16(any::<u8>()).prop_map(DeviceId::from_bytes)
}

/// Strategy for card keys over [`WORDS`].
pub fn item_key_strategy() -> impl Strategy<Value = ItemKey> + Clone {
    (
        prop_oneof![4 => Just(ItemKind::Lexeme), 1 => Just(ItemKind::Listening)],
        0..WORDS.len(),
    )
        .prop_map(|(kind, i)| ItemKey::new(kind, WORDS[i]))
}

/// Strategy for ratings, weighted toward success.
pub fn rating_strategy() -> impl Strategy<Value = Rating> {
    prop_oneof![
        3 => Just(Rating::Again),
        1 => Just(Rating::Hard),
        4 => Just(Rating::Good),
        1 => Just(Rating::Easy),
    ]
}

/// Strategy for valid payloads, mostly reviews.
pub fn payload_strategy() -> impl Strategy<Value = EventPayload> {
    let key = item_key_strategy();
    prop_oneof![
        10 => (key.clone(), rating_strategy())
            .prop_map(|(key, rating)| EventPayload::Review { key, rating }),
        1 => prop::collection::vec(key.clone(), 1..3)
            .prop_map(|keys| EventPayload::CardEdit(CardEdit::Add { keys })),
        1 => key.clone().prop_map(|key| EventPayload::CardEdit(CardEdit::Reset { key })),
        1 => key.clone()
            .prop_map(|key| EventPayload::SettingChange(SettingChange::Suspend { key })),
        1 => key.prop_map(|key| EventPayload::SettingChange(SettingChange::Unsuspend { key })),
    ]
}

/// Strategy for one device's events: seqs `0..n`, timestamps in `1..max_ms`.
pub fn device_stream_strategy(
    device: DeviceId,
    max_len: usize,
    max_ms: u64,
) -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec((1..max_ms.max(2), payload_strategy()), 0..=max_len).prop_map(
        move |entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(seq, (ms, payload))| {
                    Event::new(
                        EventId::new(device, seq as u64),
                        Timestamp::from_millis(ms),
                        payload,
                    )
                })
                .collect()
        },
    )
}

/// Strategy for several devices' streams; device `i` has id bytes `[i + 1; 16]`.
pub fn multi_device_strategy(
    devices: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<Vec<Event>>> {
    (0..devices)
        .map(|i| device_stream_strategy(DeviceId::from_bytes([i as u8 + 1; 16]), max_len, 100_000))
        .collect::<Vec<_>>()
}
