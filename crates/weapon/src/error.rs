//! Facade error type.

use thiserror::Error;
use weapon_core::LogError;
use weapon_deck::DeckError;
use weapon_storage::StorageError;
use weapon_sync_engine::SyncError;

/// Result type for facade operations.
pub type WeaponResult<T> = Result<T, WeaponError>;

/// Errors returned by [`Weapon`](crate::Weapon).
#[derive(Debug, Error)]
pub enum WeaponError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Event log error, including validation failures.
    #[error(transparent)]
    Log(#[from] LogError),

    /// Projection configuration error.
    #[error("deck error: {0}")]
    Deck(#[from] DeckError),

    /// Sync could not start.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A backend with this name is already registered.
    #[error("sync backend {0:?} is already registered")]
    BackendExists(String),

    /// A background task did not complete.
    #[error("background task failed: {0}")]
    Background(String),
}

impl WeaponError {
    /// Returns true if the error is a rejected local event.
    pub fn is_validation(&self) -> bool {
        matches!(self, WeaponError::Log(e) if e.as_validation().is_some())
    }
}
