//! # Weapon Deck
//!
//! Deterministic projection of the weapon event log.
//!
//! This crate provides:
//! - A pluggable [`Scheduler`] and the default FSRS-backed [`FsrsScheduler`]
//! - [`Projector`], the incremental fold from events to [`ItemState`]
//! - Leech tracking over a recent review window ([`LeechPolicy`])
//! - Knowledge views over a host-supplied [`KnowledgeCatalog`], memoized per
//!   log version
//!
//! Everything here is a pure function of the log contents: two replicas
//! holding the same events produce identical state, whatever order the
//! events arrived in.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod catalog;
mod error;
mod item;
mod leech;
mod projector;
mod scheduler;
mod stats;
mod views;

pub use cache::Memo;
pub use catalog::{DefaultEstimator, KnowledgeCatalog, KnowledgeEstimator, Movie, WordFrequency};
pub use error::{DeckError, DeckResult};
pub use item::{apply_event, fold, CardSummary, ItemState};
pub use leech::{LeechPolicy, RecentOutcomes};
pub use projector::Projector;
pub use scheduler::{CardState, FsrsScheduler, Memory, Schedule, Scheduler, SchedulerConfig};
pub use stats::{daily_streak, DeckStats};
pub use views::{FrequencyKnowledgePoint, MovieStats, CHART_TARGETS, KNOWN_THRESHOLD};

use std::sync::Arc;
use weapon_core::{EventLog, ItemKey, Timestamp};

#[derive(Debug, Default)]
struct ViewCache {
    leeches: Memo<Vec<CardSummary>>,
    movies: Memo<Vec<MovieStats>>,
    chart: Memo<Vec<FrequencyKnowledgePoint>>,
    percent_known: Memo<f64>,
}

/// Derived read side of one event log.
///
/// A deck never owns the log; every query takes it by reference, first folds
/// whatever was appended since the previous query, then answers from the
/// projection. View results are cached per log version and shared through
/// [`Arc`].
pub struct Deck<S = FsrsScheduler, E = DefaultEstimator> {
    scheduler: S,
    estimator: E,
    policy: LeechPolicy,
    catalog: KnowledgeCatalog,
    projector: Projector,
    cache: ViewCache,
}

impl Deck {
    /// Deck with the standard scheduler and estimator.
    #[must_use]
    pub fn standard(policy: LeechPolicy, catalog: KnowledgeCatalog) -> Self {
        Self::new(FsrsScheduler::default(), DefaultEstimator, policy, catalog)
    }
}

impl<S: Scheduler, E: KnowledgeEstimator> Deck<S, E> {
    /// Creates a deck.
    #[must_use]
    pub fn new(scheduler: S, estimator: E, policy: LeechPolicy, catalog: KnowledgeCatalog) -> Self {
        Self {
            scheduler,
            estimator,
            policy,
            catalog,
            projector: Projector::new(),
            cache: ViewCache::default(),
        }
    }

    /// Folds events appended since the last call. Returns how many.
    pub fn refresh(&mut self, log: &EventLog) -> usize {
        self.projector.catch_up(log, &self.scheduler, &self.policy)
    }

    /// Current state of `key`; an untouched key is `New`.
    pub fn project(&mut self, log: &EventLog, key: &ItemKey) -> ItemState {
        self.refresh(log);
        self.projector
            .get(key)
            .cloned()
            .unwrap_or_else(|| ItemState::new(key.clone()))
    }

    /// Cards that keep lapsing.
    pub fn get_leeches(&mut self, log: &EventLog) -> Arc<Vec<CardSummary>> {
        self.refresh(log);
        let projector = &self.projector;
        self.cache
            .leeches
            .get_or_compute(log.version(), || views::leeches(projector))
    }

    /// Comprehension per movie, best understood first.
    pub fn get_movie_stats(&mut self, log: &EventLog) -> Arc<Vec<MovieStats>> {
        self.refresh(log);
        let (catalog, projector, estimator) = (&self.catalog, &self.projector, &self.estimator);
        self.cache.movies.get_or_compute(log.version(), || {
            views::movie_stats(catalog, projector, estimator)
        })
    }

    /// Predicted knowledge by corpus frequency.
    pub fn get_frequency_knowledge_chart_data(
        &mut self,
        log: &EventLog,
    ) -> Arc<Vec<FrequencyKnowledgePoint>> {
        self.refresh(log);
        let (catalog, projector, estimator) = (&self.catalog, &self.projector, &self.estimator);
        self.cache.chart.get_or_compute(log.version(), || {
            views::frequency_knowledge_chart(catalog, projector, estimator)
        })
    }

    /// Frequency-weighted share of catalog words known, 0 to 100.
    pub fn get_percent_of_words_known(&mut self, log: &EventLog) -> f64 {
        self.refresh(log);
        let (catalog, projector, estimator) = (&self.catalog, &self.projector, &self.estimator);
        *self.cache.percent_known.get_or_compute(log.version(), || {
            views::percent_of_words_known(catalog, projector, estimator)
        })
    }

    /// Deck-wide counters as of `now`.
    pub fn stats(&mut self, log: &EventLog, now: Timestamp) -> DeckStats {
        self.refresh(log);
        DeckStats {
            total_reviews: self.projector.total_reviews(),
            daily_streak: daily_streak(self.projector.review_days(), now),
            cards: self.projector.len(),
            due_count: self.projector.items().filter(|i| i.is_due(now)).count(),
            leech_count: self.projector.leeches().count(),
        }
    }

    /// Replaces the catalog and drops cached views that depend on it.
    pub fn set_catalog(&mut self, catalog: KnowledgeCatalog) {
        self.catalog = catalog;
        self.cache.movies.clear();
        self.cache.chart.clear();
        self.cache.percent_known.clear();
    }

    /// The projection, as of the last refresh.
    #[must_use]
    pub const fn projector(&self) -> &Projector {
        &self.projector
    }

    /// Active leech policy.
    #[must_use]
    pub const fn policy(&self) -> &LeechPolicy {
        &self.policy
    }

    /// Times each cached view has been computed: leeches, movies, chart.
    #[must_use]
    pub const fn view_computations(&self) -> (u64, u64, u64) {
        (
            self.cache.leeches.computed(),
            self.cache.movies.computed(),
            self.cache.chart.computed(),
        )
    }
}

impl<S, E> std::fmt::Debug for Deck<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deck")
            .field("policy", &self.policy)
            .field("cards", &self.projector.len())
            .field("version", &self.projector.version())
            .finish_non_exhaustive()
    }
}
