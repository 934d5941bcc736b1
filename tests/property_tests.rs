//! Property-based tests for identifiers, similarity, and scoring.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Directory identifiers ignore creation order and track every byte
//! - Fuzzy similarity is reflexive, symmetric, and bounded
//! - Confidence is bounded and a pure function of its input
//! - URL normalization is idempotent

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use proptest::prelude::*;
use srcorigin::config::FuzzyConfig;
use srcorigin::models::MatchType;
use srcorigin::services::{
    ConfidenceScorer, ContentAddresser, FuzzyMatcher, ScoreInput, normalize_origin_url,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Strategies
// ============================================================================

/// Relative `.c` paths, at most one directory deep, with contents.
fn file_tree() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        "[a-z]{1,6}(/[a-z]{1,6})?\\.c",
        prop::collection::vec(any::<u8>(), 0..64),
        1..8,
    )
}

fn write_tree<'a>(root: &Path, files: impl Iterator<Item = (&'a String, &'a Vec<u8>)>) {
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn match_type() -> impl Strategy<Value = MatchType> {
    prop_oneof![Just(MatchType::Exact), Just(MatchType::Fuzzy)]
}

// ============================================================================
// Content addressing
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: creation order does not change a directory identifier.
    #[test]
    fn prop_identifier_ignores_creation_order(files in file_tree()) {
        let dir = TempDir::new().unwrap();
        let forward = dir.path().join("forward");
        let backward = dir.path().join("backward");
        write_tree(&forward, files.iter());
        write_tree(&backward, files.iter().rev());

        let addresser = ContentAddresser::new();
        prop_assert_eq!(
            addresser.identify(&forward).unwrap(),
            addresser.identify(&backward).unwrap()
        );
    }

    /// Property: flipping one byte of one file changes the identifier.
    #[test]
    fn prop_identifier_tracks_every_byte(
        files in file_tree(),
        pick in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("original");
        let edited = dir.path().join("edited");
        write_tree(&original, files.iter());

        let mut changed = files.clone();
        let key = pick.get(&files.keys().cloned().collect::<Vec<_>>()).clone();
        let content = changed.get_mut(&key).unwrap();
        if content.is_empty() {
            content.push(flip);
        } else {
            content[0] ^= flip;
        }
        write_tree(&edited, changed.iter());

        let addresser = ContentAddresser::new();
        prop_assert_ne!(
            addresser.identify(&original).unwrap(),
            addresser.identify(&edited).unwrap()
        );
    }

    /// Property: a manifest compared with itself scores exactly 1.
    #[test]
    fn prop_fuzzy_self_similarity_is_one(files in file_tree()) {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), files.iter());
        let manifest = ContentAddresser::new().manifest(dir.path()).unwrap();

        let matcher = FuzzyMatcher::new(FuzzyConfig::default());
        prop_assert_eq!(matcher.similarity(&manifest, &manifest), 1.0);
    }

    /// Property: similarity is symmetric and stays in `[0, 1]`.
    #[test]
    fn prop_fuzzy_symmetric_and_bounded(a in file_tree(), b in file_tree()) {
        let dir = TempDir::new().unwrap();
        let left = dir.path().join("left");
        let right = dir.path().join("right");
        write_tree(&left, a.iter());
        write_tree(&right, b.iter());
        let addresser = ContentAddresser::new();
        let left = addresser.manifest(&left).unwrap();
        let right = addresser.manifest(&right).unwrap();

        let matcher = FuzzyMatcher::new(FuzzyConfig {
            file_set_threshold: 0.0,
            ..FuzzyConfig::default()
        });
        let forward = matcher.similarity(&left, &right);
        let backward = matcher.similarity(&right, &left);
        prop_assert!((forward - backward).abs() < 1e-12);
        prop_assert!((0.0..=1.0).contains(&forward));
    }
}

// ============================================================================
// Scoring
// ============================================================================

proptest! {
    /// Property: confidence is bounded and repeatable.
    #[test]
    fn prop_confidence_bounded_and_pure(
        match_type in match_type(),
        similarity in -1.0f64..2.0,
        frequency_rank in 0u64..10_000,
        is_official_org in any::<bool>(),
        age_days in prop::option::of(-365i64..4000),
    ) {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let scorer = ConfidenceScorer::at(now);
        let input = ScoreInput {
            match_type,
            similarity,
            frequency_rank,
            is_official_org,
            last_activity: age_days.map(|d| now - ChronoDuration::days(d)),
        };

        let first = scorer.score(&input);
        prop_assert!((0.0..=1.0).contains(&first));
        prop_assert_eq!(first.to_bits(), scorer.score(&input).to_bits());
    }

    /// Property: an official organization never lowers confidence.
    #[test]
    fn prop_authority_is_monotone(
        match_type in match_type(),
        similarity in 0.0f64..=1.0,
        frequency_rank in 0u64..100,
    ) {
        let scorer = ConfidenceScorer::at(Utc::now());
        let input = |is_official_org| ScoreInput {
            match_type,
            similarity,
            frequency_rank,
            is_official_org,
            last_activity: None,
        };
        prop_assert!(scorer.score(&input(true)) >= scorer.score(&input(false)));
    }

    /// Property: URL normalization is idempotent.
    #[test]
    fn prop_normalization_idempotent(
        scheme in prop::sample::select(vec!["https://", "http://", "HTTPS://", "git://"]),
        host in prop::sample::select(vec!["github.com", "GitLab.com", "www.github.com", "example.org:8080"]),
        owner in "[A-Za-z0-9_-]{1,12}",
        repo in "[A-Za-z0-9_-]{1,12}",
        suffix in prop::sample::select(vec!["", "/", ".git", ".git/"]),
    ) {
        let url = format!("{scheme}{host}/{owner}/{repo}{suffix}");
        let once = normalize_origin_url(&url);
        prop_assert_eq!(normalize_origin_url(&once), once.clone());
    }
}
