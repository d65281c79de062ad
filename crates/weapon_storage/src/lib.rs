//! # Weapon Storage
//!
//! Byte-level storage for the weapon event log.
//!
//! Backends here know nothing about events or record framing. They hold a
//! single growing byte sequence that supports appending at the end, reading
//! any range back, forcing data to durable media, and cutting off a damaged
//! tail during recovery.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral, used by tests and by engines that do
//!   not need persistence
//! - [`FileBackend`] - a single file on disk
//!
//! ## Example
//!
//! ```rust
//! use weapon_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"review").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"review");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
