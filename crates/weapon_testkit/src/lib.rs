//! # Weapon Testkit
//!
//! Test utilities for weapon.
//!
//! This crate provides:
//! - Property-based generators for keys, payloads and per-device event
//!   streams
//! - Fixtures: a replica in a temporary directory, an in-process remote,
//!   and a two-device harness that syncs through it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use weapon_testkit::prelude::*;
//!
//! let harness = TwoDeviceHarness::new();
//! harness.a.add_event(review_payload("casa", Rating::Good)).unwrap();
//! harness.sync_all();
//! assert_eq!(harness.b.num_events(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
