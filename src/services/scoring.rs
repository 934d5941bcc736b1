//! Confidence scoring.
//!
//! ```text
//! base       = 0.9                      (exact)
//!            = similarity * 0.8         (fuzzy)
//! frequency  = min(1.2, 1 + 0.05 * rank)
//! authority  = 1.15 if official org else 1.0
//! recency    = 1.10 (< 30 days) | 1.05 (< 365 days) | 0.95 (older) | 1.0 (unknown)
//!
//! confidence = min(1, base * frequency * authority * recency)
//! ```
//!
//! The product is clamped once, at the end.

use crate::models::MatchType;
use chrono::{DateTime, TimeDelta, Utc};

/// Base score of an exact match.
pub const EXACT_BASE: f64 = 0.9;
/// Similarity factor for fuzzy matches.
pub const FUZZY_FACTOR: f64 = 0.8;
/// Frequency multiplier step per rank.
pub const FREQUENCY_STEP: f64 = 0.05;
/// Frequency multiplier cap.
pub const FREQUENCY_CAP: f64 = 1.2;
/// Multiplier for official organisations.
pub const AUTHORITY_MULTIPLIER: f64 = 1.15;

/// Raw signals of one match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInput {
    /// How the match was established.
    pub match_type: MatchType,
    /// Similarity in `[0, 1]`; ignored for exact matches.
    pub similarity: f64,
    /// Popularity signal.
    pub frequency_rank: u64,
    /// Whether the origin belongs to the project's official organisation.
    pub is_official_org: bool,
    /// Last known activity.
    pub last_activity: Option<DateTime<Utc>>,
}

/// Deterministic multi-factor scorer.
///
/// The reference time is fixed at construction, so a scorer always maps the
/// same input to the same output.
///
/// # Example
///
/// ```rust
/// use srcorigin::models::MatchType;
/// use srcorigin::services::{ConfidenceScorer, ScoreInput};
///
/// let scorer = ConfidenceScorer::at(chrono::Utc::now());
/// let score = scorer.score(&ScoreInput {
///     match_type: MatchType::Exact,
///     similarity: 1.0,
///     frequency_rank: 0,
///     is_official_org: false,
///     last_activity: None,
/// });
/// assert!((score - 0.9).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    now: DateTime<Utc>,
}

impl ConfidenceScorer {
    /// Scorer with `now` as reference time.
    #[must_use]
    pub const fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Reference time.
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Final confidence in `[0, 1]`.
    #[must_use]
    pub fn score(&self, input: &ScoreInput) -> f64 {
        let raw = base_score(input.match_type, input.similarity)
            * frequency_multiplier(input.frequency_rank)
            * authority_multiplier(input.is_official_org)
            * recency_multiplier(input.last_activity, self.now);
        raw.min(1.0)
    }
}

/// Base score before multipliers.
#[must_use]
pub fn base_score(match_type: MatchType, similarity: f64) -> f64 {
    match match_type {
        MatchType::Exact => EXACT_BASE,
        MatchType::Fuzzy => {
            let similarity = if similarity.is_nan() {
                0.0
            } else {
                similarity.clamp(0.0, 1.0)
            };
            similarity * FUZZY_FACTOR
        },
    }
}

/// `min(1.2, 1 + 0.05 * rank)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn frequency_multiplier(rank: u64) -> f64 {
    FREQUENCY_STEP.mul_add(rank as f64, 1.0).min(FREQUENCY_CAP)
}

/// Authority multiplier.
#[must_use]
pub const fn authority_multiplier(is_official_org: bool) -> f64 {
    if is_official_org {
        AUTHORITY_MULTIPLIER
    } else {
        1.0
    }
}

/// Recency multiplier; activity in the future counts as recent.
#[must_use]
pub fn recency_multiplier(last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(last) = last_activity else {
        return 1.0;
    };
    let age = now - last;
    if age < TimeDelta::days(30) {
        1.10
    } else if age < TimeDelta::days(365) {
        1.05
    } else {
        0.95
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn input(match_type: MatchType, similarity: f64) -> ScoreInput {
        ScoreInput {
            match_type,
            similarity,
            frequency_rank: 0,
            is_official_org: false,
            last_activity: None,
        }
    }

    #[test_case(0, 1.0)]
    #[test_case(1, 1.05)]
    #[test_case(4, 1.2)]
    #[test_case(100, 1.2)]
    fn test_frequency_multiplier(rank: u64, expected: f64) {
        assert!((frequency_multiplier(rank) - expected).abs() < 1e-12);
    }

    #[test_case(Some(5), 1.10; "last week")]
    #[test_case(Some(29), 1.10; "just under a month")]
    #[test_case(Some(30), 1.05; "a month")]
    #[test_case(Some(364), 1.05; "under a year")]
    #[test_case(Some(365), 0.95; "a year")]
    #[test_case(Some(-3), 1.10; "future")]
    #[test_case(None, 1.0; "unknown")]
    fn test_recency_multiplier(days_ago: Option<i64>, expected: f64) {
        let last = days_ago.map(|d| now() - TimeDelta::days(d));
        assert!((recency_multiplier(last, now()) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_exact_base() {
        let score = ConfidenceScorer::at(now()).score(&input(MatchType::Exact, 0.3));
        assert!((score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_fuzzy_base() {
        let score = ConfidenceScorer::at(now()).score(&input(MatchType::Fuzzy, 0.75));
        assert!((score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_clamped_only_at_end() {
        // 0.9 * 1.2 * 1.15 * 1.10 > 1
        let score = ConfidenceScorer::at(now()).score(&ScoreInput {
            match_type: MatchType::Exact,
            similarity: 1.0,
            frequency_rank: 10,
            is_official_org: true,
            last_activity: Some(now()),
        });
        assert!((score - 1.0).abs() < f64::EPSILON);

        // Fuzzy 0.5 -> 0.4 * 1.2 * 1.15 * 1.10 = 0.6072, no intermediate clamp.
        let score = ConfidenceScorer::at(now()).score(&ScoreInput {
            match_type: MatchType::Fuzzy,
            similarity: 0.5,
            frequency_rank: 10,
            is_official_org: true,
            last_activity: Some(now()),
        });
        assert!((score - 0.4 * 1.2 * 1.15 * 1.10).abs() < 1e-12);
    }

    #[test]
    fn test_official_org_never_lowers() {
        let scorer = ConfidenceScorer::at(now());
        let plain = scorer.score(&input(MatchType::Fuzzy, 0.6));
        let official = scorer.score(&ScoreInput {
            is_official_org: true,
            ..input(MatchType::Fuzzy, 0.6)
        });
        assert!(official > plain);
    }

    #[test]
    fn test_out_of_range_similarity_is_bounded() {
        let scorer = ConfidenceScorer::at(now());
        assert!(scorer.score(&input(MatchType::Fuzzy, -4.0)).abs() < f64::EPSILON);
        assert!(scorer.score(&input(MatchType::Fuzzy, f64::NAN)).abs() < f64::EPSILON);
        assert!(scorer.score(&input(MatchType::Fuzzy, 7.0)) <= 1.0);
    }
}
