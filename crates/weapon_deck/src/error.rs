//! Error types for deck configuration and catalogs.

use thiserror::Error;

/// Result type for deck operations.
pub type DeckResult<T> = Result<T, DeckError>;

/// Errors raised while configuring a deck.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeckError {
    /// Leech policy window must hold at least one review.
    #[error("leech window must be at least 1")]
    EmptyLeechWindow,

    /// Scheduler settings are unusable.
    #[error("invalid scheduler config: {0}")]
    InvalidScheduler(String),

    /// Catalog content is malformed.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}
