//! Scoring, deduplication and ranking of gathered findings.
//!
//! Everything here is synchronous and deterministic: the same findings
//! produce the same ranked list no matter in which order worker tasks
//! delivered them.

use crate::models::{DirectoryCandidate, MatchRecord, MatchType, OriginCandidate, PackageCoordinates};
use crate::providers::StrategyKind;
use crate::services::enrichment::is_official_organization;
use crate::services::scoring::{ConfidenceScorer, ScoreInput};
use crate::services::url::normalize_origin_url;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Metadata keys carrying a popularity count.
const FREQUENCY_KEYS: &[&str] = &["visit_count", "frequency"];

/// Metadata keys carrying an RFC 3339 activity timestamp.
const ACTIVITY_KEYS: &[&str] = &["last_activity", "last_seen", "pushed_at"];

/// An origin accepted for one candidate, before scoring.
#[derive(Debug, Clone)]
pub(super) struct Finding {
    pub candidate: usize,
    pub strategy: StrategyKind,
    pub match_type: MatchType,
    pub similarity: f64,
    pub origin: OriginCandidate,
}

/// A scored record plus the metadata enrichment reads later.
#[derive(Debug, Clone)]
pub(super) struct Scored {
    pub record: MatchRecord,
    pub metadata: Map<String, Value>,
    /// URL as the provider reported it, before normalization.
    pub source_url: String,
}

/// Score of a finding considered on its own, without run-wide sightings.
pub(super) fn provisional_score(finding: &Finding, scorer: &ConfidenceScorer) -> f64 {
    let url = normalize_origin_url(&finding.origin.origin_url);
    scorer.score(&score_input(finding, &url, 0))
}

/// Scores every finding.
///
/// Origins without a popularity count in their metadata get the number of
/// additional sightings of the same normalized URL in this run.
pub(super) fn score_findings(
    findings: &[Finding],
    candidates: &[DirectoryCandidate],
    scorer: &ConfidenceScorer,
) -> Vec<Scored> {
    let urls: Vec<String> = findings
        .iter()
        .map(|f| normalize_origin_url(&f.origin.origin_url))
        .collect();
    let mut sightings: HashMap<&str, u64> = HashMap::new();
    for url in &urls {
        *sightings.entry(url.as_str()).or_default() += 1;
    }

    findings
        .iter()
        .zip(&urls)
        .filter_map(|(finding, url)| {
            let candidate = candidates.get(finding.candidate)?;
            let extra = sightings.get(url.as_str()).copied().unwrap_or(1).saturating_sub(1);
            let input = score_input(finding, url, extra);
            let confidence = scorer.score(&input);
            Some(Scored {
                record: MatchRecord {
                    origin_url: url.clone(),
                    match_type: input.match_type,
                    similarity: input.similarity,
                    frequency_rank: input.frequency_rank,
                    is_official_org: input.is_official_org,
                    last_activity: input.last_activity,
                    confidence,
                    strategy: finding.strategy,
                    matched_identifier: finding.origin.matched_identifier,
                    candidate_path: candidate.path().to_path_buf(),
                    coordinates: PackageCoordinates::default(),
                    purl: None,
                },
                metadata: finding.origin.raw_metadata.clone(),
                source_url: finding.origin.origin_url.clone(),
            })
        })
        .collect()
}

fn score_input(finding: &Finding, normalized_url: &str, extra_sightings: u64) -> ScoreInput {
    let metadata = &finding.origin.raw_metadata;
    ScoreInput {
        match_type: finding.match_type,
        similarity: finding.similarity,
        frequency_rank: frequency_rank(metadata).unwrap_or(extra_sightings),
        is_official_org: is_official_organization(normalized_url, metadata),
        last_activity: last_activity(metadata),
    }
}

fn frequency_rank(metadata: &Map<String, Value>) -> Option<u64> {
    FREQUENCY_KEYS
        .iter()
        .find_map(|k| metadata.get(*k).and_then(Value::as_u64))
}

fn last_activity(metadata: &Map<String, Value>) -> Option<DateTime<Utc>> {
    ACTIVITY_KEYS.iter().find_map(|k| {
        metadata
            .get(*k)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Keeps the best record per normalized URL.
///
/// Ties on confidence prefer exact matches, then the shallower candidate path.
pub(super) fn dedupe(scored: Vec<Scored>) -> Vec<Scored> {
    let mut best: HashMap<String, Scored> = HashMap::new();
    for item in scored {
        match best.get(&item.record.origin_url) {
            Some(current) if !is_better(&item.record, &current.record) => {},
            _ => {
                best.insert(item.record.origin_url.clone(), item);
            },
        }
    }
    best.into_values().collect()
}

fn is_better(candidate: &MatchRecord, current: &MatchRecord) -> bool {
    candidate
        .confidence
        .total_cmp(&current.confidence)
        .then_with(|| exactness(candidate.match_type).cmp(&exactness(current.match_type)))
        .then_with(|| current.candidate_path.cmp(&candidate.candidate_path))
        == Ordering::Greater
}

const fn exactness(match_type: MatchType) -> u8 {
    match match_type {
        MatchType::Exact => 1,
        MatchType::Fuzzy => 0,
    }
}

/// Sorts by official organisation, then confidence, then URL.
pub(super) fn rank(scored: &mut [Scored]) {
    scored.sort_by(|a, b| {
        b.record
            .is_official_org
            .cmp(&a.record.is_official_org)
            .then_with(|| b.record.confidence.total_cmp(&a.record.confidence))
            .then_with(|| a.record.origin_url.cmp(&b.record.origin_url))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateRelation, ContentIdentifier, ObjectKind};
    use std::path::PathBuf;

    fn candidates() -> Vec<DirectoryCandidate> {
        vec![
            DirectoryCandidate::new(
                PathBuf::from("/work/zlib"),
                ContentIdentifier::new(ObjectKind::Tree, [1; 32]),
                0,
                CandidateRelation::Origin,
                10,
            ),
            DirectoryCandidate::new(
                PathBuf::from("/work/zlib/contrib"),
                ContentIdentifier::new(ObjectKind::Tree, [2; 32]),
                1,
                CandidateRelation::Descendant,
                4,
            ),
        ]
    }

    fn finding(candidate: usize, url: &str, match_type: MatchType, similarity: f64) -> Finding {
        Finding {
            candidate,
            strategy: StrategyKind::Archive,
            match_type,
            similarity,
            origin: OriginCandidate::new(url, "archive"),
        }
    }

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::at(Utc::now())
    }

    #[test]
    fn test_sightings_feed_frequency_rank() {
        let findings = vec![
            finding(0, "https://github.com/someone/zlib", MatchType::Exact, 1.0),
            finding(1, "https://github.com/someone/zlib.git", MatchType::Exact, 1.0),
            finding(0, "https://example.org/zlib", MatchType::Exact, 1.0),
        ];
        let scored = score_findings(&findings, &candidates(), &scorer());
        assert_eq!(scored[0].record.frequency_rank, 1);
        assert_eq!(scored[1].record.frequency_rank, 1);
        assert_eq!(scored[2].record.frequency_rank, 0);
        assert_eq!(scored[1].record.origin_url, "https://github.com/someone/zlib");
    }

    #[test]
    fn test_metadata_signals() {
        let mut f = finding(0, "https://example.org/zlib", MatchType::Exact, 1.0);
        f.origin = f
            .origin
            .with_metadata("visit_count", 3)
            .with_metadata("last_seen", "2020-01-01T00:00:00Z");
        let scored = score_findings(&[f], &candidates(), &scorer());
        let record = &scored[0].record;
        assert_eq!(record.frequency_rank, 3);
        assert!(record.last_activity.is_some());
        // 0.9 * 1.15 * 0.95
        assert!((record.confidence - 0.9 * 1.15 * 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_dedupe_keeps_highest_confidence() {
        let findings = vec![
            finding(0, "https://example.org/zlib", MatchType::Fuzzy, 0.6),
            finding(1, "https://example.org/zlib/", MatchType::Exact, 1.0),
        ];
        let deduped = dedupe(score_findings(&findings, &candidates(), &scorer()));
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].record.match_type, MatchType::Exact);
    }

    #[test]
    fn test_rank_official_first_then_confidence_then_url() {
        let findings = vec![
            finding(0, "https://example.org/b", MatchType::Exact, 1.0),
            finding(0, "https://example.org/a", MatchType::Exact, 1.0),
            finding(0, "https://github.com/madler/zlib", MatchType::Fuzzy, 0.7),
            finding(0, "https://example.org/c", MatchType::Fuzzy, 0.9),
        ];
        let mut scored = dedupe(score_findings(&findings, &candidates(), &scorer()));
        rank(&mut scored);
        let urls: Vec<_> = scored.iter().map(|s| s.record.origin_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://github.com/madler/zlib",
                "https://example.org/a",
                "https://example.org/b",
                "https://example.org/c",
            ]
        );
    }

    #[test]
    fn test_provisional_score_ignores_sightings() {
        let f = finding(0, "https://example.org/zlib", MatchType::Exact, 1.0);
        assert!((provisional_score(&f, &scorer()) - 0.9).abs() < 1e-12);
    }
}
