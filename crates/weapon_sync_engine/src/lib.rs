//! # Weapon Sync Engine
//!
//! Client-side synchronization between a local event log and named remote
//! backends.
//!
//! This crate provides:
//! - [`SyncEngine`], one per backend: push local events the backend has not
//!   acknowledged, pull remote events the log lacks, then commit a watermark
//! - [`SyncTransport`] with HTTP, mock and fault-injecting implementations
//! - [`SyncApplier`], the seam to local storage, with a log-backed
//!   [`LogApplier`]
//!
//! ## Cycle
//!
//! ```text
//! Idle -> Syncing -> Idle        (committed)
//!                 -> Errored -> Idle   (aborted, watermarks untouched)
//! ```
//!
//! A second `sync` on a backend that is already syncing fails with
//! [`SyncError::AlreadyInProgress`]. Other failures are recorded in the
//! backend's [`SyncState`] and returned as [`SyncOutcome::Failed`]. There is
//! no retry timer; every cycle starts from persisted state, so calling
//! `sync` again after any failure is safe.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod config;
mod engine;
mod error;
mod http;
mod transport;

pub use applier::{ApplySummary, LogApplier, SyncApplier};
pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncOutcome, SyncPhase, SyncReport, SyncState, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, LoopbackServer, TransportFailure};
pub use transport::{Fault, FaultyTransport, MockTransport, SyncTransport, TransportOp};
