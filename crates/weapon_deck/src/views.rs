//! Read models computed from a caught-up [`Projector`].

use crate::catalog::{KnowledgeCatalog, KnowledgeEstimator};
use crate::item::CardSummary;
use crate::projector::Projector;
use serde::Serialize;
use std::collections::BTreeSet;
use weapon_core::ItemKey;

/// Estimated knowledge at or above this counts as known.
pub const KNOWN_THRESHOLD: f64 = 0.5;

const MILESTONE_PERCENT: u64 = 5;
const MAX_EXAMPLES: usize = 5;

/// Occurrence counts sampled by the frequency chart, roughly log-spaced.
pub const CHART_TARGETS: &[u64] = &[
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 15, 20, 30, 40, 50, 60, 70, 80, 90, 100, 150, 200, 300, 400,
    500, 600, 700, 800, 900, 1000, 1500, 2000, 3000, 4000, 5000, 6000, 7000, 8000, 9000, 10000,
];

/// Comprehension of one movie.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieStats {
    /// Movie id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Share of the movie's word occurrences that are known, 0 to 100.
    pub percent_known: f64,
    /// Unknown words, most frequent first, needed to reach the next 5%
    /// milestone. `None` once everything is known.
    pub cards_to_next_milestone: Option<u32>,
}

/// One point of the frequency/knowledge chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyKnowledgePoint {
    /// Target occurrence count.
    pub frequency: f64,
    /// Mean predicted knowledge of the matching words.
    pub predicted_knowledge: f64,
    /// Matching words.
    pub word_count: u32,
    /// Up to five matching words, comma separated.
    pub example_words: String,
}

fn is_known<E: KnowledgeEstimator + ?Sized>(
    projector: &Projector,
    estimator: &E,
    key: &ItemKey,
) -> bool {
    !projector.is_leech(key)
        && estimator.estimate(projector.get(key), projector.latest_timestamp()) >= KNOWN_THRESHOLD
}

/// Current leeches in key order.
#[must_use]
pub fn leeches(projector: &Projector) -> Vec<CardSummary> {
    projector.leeches().map(|item| item.summary()).collect()
}

/// Frequency-weighted share of catalog words that are known, 0 to 100.
#[must_use]
pub fn percent_of_words_known<E: KnowledgeEstimator + ?Sized>(
    catalog: &KnowledgeCatalog,
    projector: &Projector,
    estimator: &E,
) -> f64 {
    if catalog.total_count() == 0 {
        return 0.0;
    }
    let known: u64 = catalog
        .words()
        .iter()
        .filter(|w| is_known(projector, estimator, &ItemKey::lexeme(w.word.as_str())))
        .map(|w| w.count)
        .sum();
    known as f64 * 100.0 / catalog.total_count() as f64
}

/// Per-movie comprehension, best understood first. Movies without words are
/// skipped.
#[must_use]
pub fn movie_stats<E: KnowledgeEstimator + ?Sized>(
    catalog: &KnowledgeCatalog,
    projector: &Projector,
    estimator: &E,
) -> Vec<MovieStats> {
    let mut known_words = BTreeSet::new();
    for movie in catalog.movies() {
        for (word, _) in &movie.words {
            if !known_words.contains(word.as_str())
                && is_known(projector, estimator, &ItemKey::lexeme(word.as_str()))
            {
                known_words.insert(word.as_str());
            }
        }
    }

    let mut stats: Vec<MovieStats> = catalog
        .movies()
        .iter()
        .filter_map(|movie| {
            let total: u64 = movie.words.iter().map(|(_, n)| n).sum();
            if total == 0 {
                return None;
            }
            let known: u64 = movie
                .words
                .iter()
                .filter(|(w, _)| known_words.contains(w.as_str()))
                .map(|(_, n)| n)
                .sum();

            let cards_to_next_milestone = if known >= total {
                None
            } else {
                let floor_percent = known * 100 / total;
                let milestone = (floor_percent / MILESTONE_PERCENT + 1) * MILESTONE_PERCENT;
                let milestone = milestone.min(100);
                let target = (milestone * total).div_ceil(100);
                let mut unknown: Vec<u64> = movie
                    .words
                    .iter()
                    .filter(|(w, _)| !known_words.contains(w.as_str()))
                    .map(|(_, n)| *n)
                    .collect();
                unknown.sort_unstable_by(|a, b| b.cmp(a));

                let mut reached = known;
                let mut cards = 0u32;
                for count in unknown {
                    if reached >= target {
                        break;
                    }
                    reached += count;
                    cards += 1;
                }
                Some(cards)
            };

            Some(MovieStats {
                id: movie.id.clone(),
                title: movie.title.clone(),
                percent_known: known as f64 * 100.0 / total as f64,
                cards_to_next_milestone,
            })
        })
        .collect();

    stats.sort_by(|a, b| {
        b.percent_known
            .total_cmp(&a.percent_known)
            .then_with(|| a.id.cmp(&b.id))
    });
    stats
}

/// Mean predicted knowledge of words near each of [`CHART_TARGETS`].
///
/// A word joins the first target its occurrence count is strictly within
/// 10% of. Targets nobody matches are left out.
#[must_use]
pub fn frequency_knowledge_chart<E: KnowledgeEstimator + ?Sized>(
    catalog: &KnowledgeCatalog,
    projector: &Projector,
    estimator: &E,
) -> Vec<FrequencyKnowledgePoint> {
    let mut buckets: Vec<(f64, u32, Vec<&str>)> = vec![(0.0, 0, Vec::new()); CHART_TARGETS.len()];

    for word in catalog.words() {
        let Some(slot) = CHART_TARGETS
            .iter()
            .position(|&target| word.count.abs_diff(target) * 10 < target)
        else {
            continue;
        };
        let key = ItemKey::lexeme(word.word.as_str());
        let knowledge = estimator.estimate(projector.get(&key), projector.latest_timestamp());
        let (sum, n, examples) = &mut buckets[slot];
        *sum += knowledge;
        *n += 1;
        if examples.len() < MAX_EXAMPLES {
            examples.push(word.word.as_str());
        }
    }

    CHART_TARGETS
        .iter()
        .zip(buckets)
        .filter(|(_, (_, n, _))| *n > 0)
        .map(|(&target, (sum, n, examples))| FrequencyKnowledgePoint {
            frequency: target as f64,
            predicted_knowledge: sum / f64::from(n),
            word_count: n,
            example_words: examples.join(", "),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DefaultEstimator, Movie, WordFrequency};
    use crate::leech::LeechPolicy;
    use crate::scheduler::FsrsScheduler;
    use weapon_core::{DeviceId, Event, EventId, EventLog, EventPayload, Rating, Timestamp};

    fn catalog() -> KnowledgeCatalog {
        let words = vec![
            WordFrequency { word: "que".into(), rank: 1, count: 1000 },
            WordFrequency { word: "de".into(), rank: 2, count: 1020 },
            WordFrequency { word: "casa".into(), rank: 3, count: 100 },
            WordFrequency { word: "perro".into(), rank: 4, count: 8 },
        ];
        let movies = vec![
            Movie {
                id: "m1".into(),
                title: "Casa".into(),
                words: vec![("casa".into(), 60), ("perro".into(), 30), ("gato".into(), 10)],
            },
            Movie {
                id: "m2".into(),
                title: "Empty".into(),
                words: vec![],
            },
        ];
        KnowledgeCatalog::new(words, movies).unwrap()
    }

    fn graduated(words: &[&str]) -> Projector {
        let mut log = EventLog::in_memory().unwrap();
        let device = DeviceId::from_bytes([1; 16]);
        let mut seq = 0;
        for word in words {
            for _ in 0..2 {
                log.append(Event::new(
                    EventId::new(device, seq),
                    Timestamp::from_millis(1_000 + seq),
                    EventPayload::Review {
                        key: ItemKey::lexeme(*word),
                        rating: Rating::Good,
                    },
                ))
                .unwrap();
                seq += 1;
            }
        }
        let mut projector = Projector::new();
        projector.catch_up(&log, &FsrsScheduler::default(), &LeechPolicy::default());
        projector
    }

    #[test]
    fn movie_milestones() {
        let projector = graduated(&["casa"]);
        let stats = movie_stats(&catalog(), &projector, &DefaultEstimator);
        assert_eq!(stats.len(), 1);
        let m1 = &stats[0];
        assert!((m1.percent_known - 60.0).abs() < 1e-9);
        // 65% needs 5 more occurrences; "perro" alone covers it.
        assert_eq!(m1.cards_to_next_milestone, Some(1));

        let all = graduated(&["casa", "perro", "gato"]);
        let stats = movie_stats(&catalog(), &all, &DefaultEstimator);
        assert!((stats[0].percent_known - 100.0).abs() < 1e-9);
        assert_eq!(stats[0].cards_to_next_milestone, None);
    }

    #[test]
    fn percent_known_is_frequency_weighted() {
        let projector = graduated(&["que"]);
        let pct = percent_of_words_known(&catalog(), &projector, &DefaultEstimator);
        assert!((pct - 1000.0 * 100.0 / 2128.0).abs() < 1e-9);
        assert_eq!(
            percent_of_words_known(&KnowledgeCatalog::default(), &projector, &DefaultEstimator),
            0.0
        );
    }

    #[test]
    fn chart_buckets_by_count() {
        let projector = graduated(&["que"]);
        let chart = frequency_knowledge_chart(&catalog(), &projector, &DefaultEstimator);
        let freqs: Vec<f64> = chart.iter().map(|p| p.frequency).collect();
        assert_eq!(freqs, vec![8.0, 100.0, 1000.0]);

        let thousand = &chart[2];
        assert_eq!(thousand.word_count, 2);
        assert_eq!(thousand.example_words, "que, de");
        assert!(thousand.predicted_knowledge > 0.0 && thousand.predicted_knowledge < 1.0);
    }
}
