//! Candidate scoring
//!
//! A candidate's score is a weighted sum of five signals:
//! - keyword match: 1 when the item came back from an exact keyword lookup
//! - full-text score: normalized relevance from the FTS table
//! - recency of last use: `exp(-0.1 * days)`, 0 when never used
//! - frequency of use: `log10(clicks + 1) / 2`
//! - modification age: `exp(-0.05 * days)`
//!
//! Type-filtered queries add a flat bonus on top.

use serde::{Deserialize, Serialize};

pub const KEYWORD_WEIGHT: f64 = 0.45;
pub const FTS_WEIGHT: f64 = 0.35;
pub const RECENCY_WEIGHT: f64 = 0.10;
pub const FREQUENCY_WEIGHT: f64 = 0.05;
pub const MODIFIED_WEIGHT: f64 = 0.05;

/// Added when the query carried a type filter the candidate satisfies
pub const TYPE_MATCH_BONUS: f64 = 0.15;

const RECENCY_DECAY: f64 = 0.1;
const MODIFIED_DECAY: f64 = 0.05;
const MS_PER_DAY: f64 = 86_400_000.0;

/// Signal weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankWeights {
    pub keyword: f64,
    pub fts: f64,
    pub recency: f64,
    pub frequency: f64,
    pub modified: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            keyword: KEYWORD_WEIGHT,
            fts: FTS_WEIGHT,
            recency: RECENCY_WEIGHT,
            frequency: FREQUENCY_WEIGHT,
            modified: MODIFIED_WEIGHT,
        }
    }
}

impl RankWeights {
    pub fn total(&self) -> f64 {
        self.keyword + self.fts + self.recency + self.frequency + self.modified
    }
}

/// Raw inputs for one candidate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSignals {
    /// Found through the exact keyword path
    pub precise: bool,
    /// Normalized full-text score in [0, 1]
    pub fts_score: f64,
    /// Epoch milliseconds of the last recorded use
    pub last_used: Option<i64>,
    pub click_count: i64,
    /// Epoch milliseconds
    pub mtime: i64,
    pub type_match: bool,
}

/// Per-signal contributions, before weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub keyword: f64,
    pub fts: f64,
    pub recency: f64,
    pub frequency: f64,
    pub modified: f64,
    pub type_bonus: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Semantic,
}

/// Why an item matched
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchDetails {
    #[serde(rename = "type")]
    pub match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Map a raw FTS relevance value into [0, 1]
pub fn normalize_fts_score(raw: f64) -> f64 {
    if raw > 0.0 {
        1.0 / (raw + 1.0)
    } else {
        1.0
    }
}

fn days_between(now_ms: i64, then_ms: i64) -> f64 {
    ((now_ms - then_ms) as f64 / MS_PER_DAY).max(0.0)
}

/// Scores candidates against a fixed "now"
#[derive(Debug, Clone)]
pub struct Ranker {
    weights: RankWeights,
    now_ms: i64,
}

impl Ranker {
    pub fn new(weights: RankWeights, now_ms: i64) -> Self {
        Self { weights, now_ms }
    }

    pub fn weights(&self) -> &RankWeights {
        &self.weights
    }

    pub fn score(&self, signals: &CandidateSignals) -> ScoreBreakdown {
        let keyword = if signals.precise { 1.0 } else { 0.0 };
        let fts = signals.fts_score.clamp(0.0, 1.0);
        let recency = signals
            .last_used
            .map(|used| (-RECENCY_DECAY * days_between(self.now_ms, used)).exp())
            .unwrap_or(0.0);
        let frequency = ((signals.click_count.max(0) + 1) as f64).log10() / 2.0;
        let modified = (-MODIFIED_DECAY * days_between(self.now_ms, signals.mtime)).exp();
        let type_bonus = if signals.type_match { TYPE_MATCH_BONUS } else { 0.0 };

        let w = &self.weights;
        let total = w.keyword * keyword
            + w.fts * fts
            + w.recency * recency
            + w.frequency * frequency
            + w.modified * modified
            + type_bonus;

        ScoreBreakdown {
            keyword,
            fts,
            recency,
            frequency,
            modified,
            type_bonus,
            total,
        }
    }

    /// Precise keyword hits are exact; anything else is semantic with the
    /// normalized FTS score as its confidence
    pub fn match_details(&self, breakdown: &ScoreBreakdown) -> MatchDetails {
        if breakdown.keyword > 0.0 {
            MatchDetails {
                match_type: MatchType::Exact,
                confidence: None,
            }
        } else {
            MatchDetails {
                match_type: MatchType::Semantic,
                confidence: Some(breakdown.fts),
            }
        }
    }
}

/// Sort descending by score; ties keep their input order
pub fn sort_by_score<T>(items: &mut [T], score: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;
    const DAY: i64 = 86_400_000;

    fn signals() -> CandidateSignals {
        CandidateSignals {
            precise: false,
            fts_score: 0.5,
            last_used: None,
            click_count: 0,
            mtime: NOW - 10 * DAY,
            type_match: false,
        }
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((RankWeights::default().total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_fts_score() {
        assert_eq!(normalize_fts_score(-3.2), 1.0);
        assert_eq!(normalize_fts_score(0.0), 1.0);
        assert_eq!(normalize_fts_score(1.0), 0.5);
    }

    #[test]
    fn test_recent_use_never_scores_lower() {
        let ranker = Ranker::new(RankWeights::default(), NOW);
        let mut older = signals();
        older.last_used = Some(NOW - 30 * DAY);
        let mut newer = signals();
        newer.last_used = Some(NOW - DAY);
        let never = signals();

        let older = ranker.score(&older).total;
        let newer = ranker.score(&newer).total;
        let never = ranker.score(&never).total;
        assert!(newer >= older);
        assert!(older >= never);
    }

    #[test]
    fn test_exact_match_details() {
        let ranker = Ranker::new(RankWeights::default(), NOW);
        let mut precise = signals();
        precise.precise = true;

        let exact = ranker.score(&precise);
        assert_eq!(ranker.match_details(&exact).match_type, MatchType::Exact);

        let fuzzy = ranker.score(&signals());
        let details = ranker.match_details(&fuzzy);
        assert_eq!(details.match_type, MatchType::Semantic);
        assert_eq!(details.confidence, Some(0.5));
        // confidence reports the normalized FTS signal, not the weighted total
        assert_eq!(details.confidence, Some(fuzzy.fts));
        assert!(fuzzy.total < fuzzy.fts);
        assert!(exact.total > fuzzy.total);
    }

    #[test]
    fn test_type_bonus_and_sort() {
        let ranker = Ranker::new(RankWeights::default(), NOW);
        let mut typed = signals();
        typed.type_match = true;
        let bonus = ranker.score(&typed).total - ranker.score(&signals()).total;
        assert!((bonus - TYPE_MATCH_BONUS).abs() < 1e-9);

        let mut scores = vec![("a", 0.2), ("b", 0.9), ("c", 0.5)];
        sort_by_score(&mut scores, |s| s.1);
        assert_eq!(scores.iter().map(|s| s.0).collect::<Vec<_>>(), vec!["b", "c", "a"]);
    }
}
