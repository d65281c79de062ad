//! # Weapon Core
//!
//! The event-sourced heart of weapon: immutable learning events and the
//! durable log that stores them.
//!
//! This crate provides:
//! - Identity types ([`DeviceId`], [`EventId`], [`Timestamp`], [`ItemKey`])
//! - The closed set of event payloads ([`EventPayload`]) and their validation
//! - [`EventLog`], an append-only, crash-safe log ordered canonically by
//!   `(timestamp, device, seq)`
//! - [`VectorClock`], per-device event counts used to describe what a peer
//!   has seen
//! - [`DataDir`], the locked on-disk home of one engine instance
//!
//! ## Ordering
//!
//! Every event is identified by `(device, seq)`, where `seq` counts up from
//! zero without gaps on its originating device. Projection order across
//! devices is `(timestamp, device, seq)`, so events that arrive late through
//! sync still fold into the same place.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod clock;
mod config;
mod dir;
mod error;
mod event;
mod event_log;
mod types;
mod vector_clock;

pub use checkpoint::SyncCheckpoint;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LogConfig;
pub use dir::{log_file_path, peek_device_id, DataDir};
pub use error::{LogError, LogResult, ValidationError};
pub use event::{CardEdit, Event, EventPayload, Rating, SettingChange};
pub use event_log::{AppendOutcome, EventLog, LogStats, FILE_HEADER_SIZE, FORMAT_VERSION};
pub use types::{DeviceId, EventId, ItemKey, ItemKind, OrderKey, Timestamp};
pub use vector_clock::VectorClock;

/// Crate version, reported by tooling.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
