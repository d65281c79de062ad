//! # Weapon Sync Protocol
//!
//! Wire types exchanged between a weapon replica and a remote event store.
//!
//! This crate provides:
//! - Request/response pairs for handshake, push and pull
//! - [`RejectionCode`], the remote's machine-readable refusal reasons
//! - CBOR encoding of every message through the [`Wire`] trait
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Progress
//!
//! Progress is described with [`VectorClock`](weapon_core::VectorClock)s
//! rather than server cursors: a pull asks for everything the caller's clock
//! does not cover, so an interrupted pull simply resumes from whatever was
//! appended locally before the interruption.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod messages;

pub use codec::Wire;
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    endpoints, Credentials, ErrorResponse, HandshakeRequest, HandshakeResponse, PullRequest,
    PullResponse, PushRequest, PushResponse, RejectionCode, Reply, PROTOCOL_VERSION,
};
