//! # Weapon
//!
//! A local-first, event-sourced learning-record store.
//!
//! Every review, card edit and setting change is an immutable event in an
//! append-only log. Card scheduling state, leeches and knowledge views are
//! derived from that log on demand, and the log is reconciled with any
//! number of named remote backends.
//!
//! ## Usage
//!
//! ```rust
//! use weapon::{EventPayload, ItemKey, Rating, Weapon, WeaponConfig};
//!
//! let weapon = Weapon::open(WeaponConfig::new("user-1")).unwrap();
//! weapon
//!     .add_event(EventPayload::Review {
//!         key: ItemKey::lexeme("casa"),
//!         rating: Rating::Good,
//!     })
//!     .unwrap();
//!
//! assert_eq!(weapon.num_events(), 1);
//! assert!(weapon.get_sync_state("backend1").last_sync_finished.is_none());
//! ```
//!
//! ## Syncing
//!
//! Register a backend with any [`SyncTransport`], then call
//! [`Weapon::sync`]. Failures never poison the replica: they are recorded in
//! the backend's [`SyncState`] and the next call starts over from the last
//! committed watermark.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod weapon;

pub use config::WeaponConfig;
pub use error::{WeaponError, WeaponResult};
pub use weapon::Weapon;

pub use weapon_core::{
    AppendOutcome, CardEdit, Clock, DeviceId, Event, EventId, EventPayload, ItemKey, ItemKind,
    LogConfig, ManualClock, Rating, SettingChange, SystemClock, Timestamp,
};
pub use weapon_deck::{
    CardState, CardSummary, DeckStats, FrequencyKnowledgePoint, ItemState, KnowledgeCatalog,
    LeechPolicy, Movie, MovieStats, SchedulerConfig, WordFrequency,
};
pub use weapon_sync_engine::{
    HttpClient, HttpTransport, LoopbackClient, LoopbackServer, SyncConfig, SyncError,
    SyncOutcome, SyncReport, SyncState, SyncTransport, TransportFailure,
};
