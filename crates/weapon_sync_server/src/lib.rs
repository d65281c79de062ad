//! # Weapon Sync Server
//!
//! Reference implementation of the remote event store weapon replicas sync
//! against.
//!
//! This crate provides:
//! - Handshake, push and pull handlers
//! - A per-user event store that is idempotent on event id
//! - Authentication (HMAC-SHA256 tokens bound to user and device)
//! - [`SyncServer::route`], a path-plus-CBOR entry point for HTTP front ends
//!   and in-process loopback clients
//!
//! # Authentication
//!
//! Authentication is optional:
//!
//! ```rust,ignore
//! use weapon_sync_server::{AuthConfig, ServerConfig, SyncServer, TokenValidator};
//!
//! let secret = b"my-secure-secret-32-bytes-long!".to_vec();
//! let server = SyncServer::new(ServerConfig::default().with_auth(secret.clone()));
//!
//! let validator = TokenValidator::new(AuthConfig::new(secret));
//! let token = validator.create_token("user-1", device_id);
//! ```
//!
//! # Storage
//!
//! Events are kept per user and per device in seq order. A device's events
//! must arrive without gaps; resubmitting a stored event is a no-op.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod server;
mod store;

pub use auth::{AuthConfig, TokenValidator, TOKEN_LEN};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::SyncServer;
pub use store::{AppendSummary, EventStore};
