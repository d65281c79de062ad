//! Host-supplied language data: corpus word frequencies and per-movie word
//! lists, plus the estimator that turns card state into predicted knowledge.

use crate::error::{DeckError, DeckResult};
use crate::item::ItemState;
use crate::scheduler::CardState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use weapon_core::Timestamp;

/// One word of the corpus frequency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordFrequency {
    /// The word, as used in lexeme card keys.
    pub word: String,
    /// 1-based frequency rank; 1 is the most common word.
    pub rank: u32,
    /// Occurrences in the corpus.
    pub count: u64,
}

/// A movie and the words its subtitles use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    /// Stable movie identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// `(word, occurrences)` pairs.
    pub words: Vec<(String, u64)>,
}

/// Validated frequency list and movie collection.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeCatalog {
    words: Vec<WordFrequency>,
    movies: Vec<Movie>,
    total_count: u64,
}

impl KnowledgeCatalog {
    /// Builds a catalog. Words are kept in rank order.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::InvalidCatalog`] for an empty or duplicated word,
    /// a duplicated movie id, or a movie word with no text.
    pub fn new(mut words: Vec<WordFrequency>, movies: Vec<Movie>) -> DeckResult<Self> {
        let mut seen = BTreeSet::new();
        for entry in &words {
            if entry.word.trim().is_empty() {
                return Err(DeckError::InvalidCatalog(format!(
                    "empty word at rank {}",
                    entry.rank
                )));
            }
            if !seen.insert(entry.word.as_str()) {
                return Err(DeckError::InvalidCatalog(format!(
                    "duplicate word {:?}",
                    entry.word
                )));
            }
        }

        let mut movie_ids = BTreeSet::new();
        for movie in &movies {
            if !movie_ids.insert(movie.id.as_str()) {
                return Err(DeckError::InvalidCatalog(format!(
                    "duplicate movie {:?}",
                    movie.id
                )));
            }
            if movie.words.iter().any(|(w, _)| w.trim().is_empty()) {
                return Err(DeckError::InvalidCatalog(format!(
                    "movie {:?} lists an empty word",
                    movie.id
                )));
            }
        }

        words.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.word.cmp(&b.word)));
        let total_count = words.iter().map(|w| w.count).sum();
        Ok(Self {
            words,
            movies,
            total_count,
        })
    }

    /// Words in rank order.
    #[must_use]
    pub fn words(&self) -> &[WordFrequency] {
        &self.words
    }

    /// Movies in insertion order.
    #[must_use]
    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    /// Sum of all word occurrences.
    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Returns true if the catalog holds no words and no movies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.movies.is_empty()
    }
}

/// Maps a card's derived state to predicted knowledge in `[0, 1]`.
///
/// `None` means the deck has never seen the card. `as_of` is the time of the
/// latest event in the log, so an estimate is fixed for a given log version
/// and cached views stay valid.
pub trait KnowledgeEstimator: Send + Sync {
    /// Estimates how well the card is known at `as_of`.
    fn estimate(&self, state: Option<&ItemState>, as_of: Timestamp) -> f64;
}

/// FSRS retrievability of the card at `as_of`; zero for unreviewed cards.
///
/// A suspended card keeps the estimate of the state it was suspended from.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEstimator;

impl KnowledgeEstimator for DefaultEstimator {
    fn estimate(&self, state: Option<&ItemState>, as_of: Timestamp) -> f64 {
        let Some(item) = state else {
            return 0.0;
        };
        let effective = match (item.state, item.suspended_from) {
            (CardState::Suspended, Some(prior)) => prior,
            (state, _) => state,
        };
        let Some(last) = item.last_reviewed_at else {
            return 0.0;
        };
        match effective {
            CardState::New | CardState::Suspended => 0.0,
            _ => item
                .memory
                .retrievability(as_of.as_millis().saturating_sub(last.as_millis())),
        }
    }
}
