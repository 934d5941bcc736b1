//! Scored matches and discovery reports.

use super::ContentIdentifier;
use crate::providers::StrategyKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a match was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Identifier equality (or a fuzzy comparison with perfect similarity).
    Exact,
    /// Similarity above the fuzzy acceptance threshold.
    Fuzzy,
}

impl MatchType {
    /// Returns the match type as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package coordinates attached after scoring.
///
/// Coordinates never influence confidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCoordinates {
    /// Package name.
    pub name: Option<String>,
    /// Package version.
    pub version: Option<String>,
    /// License expression.
    pub license: Option<String>,
}

impl PackageCoordinates {
    /// Returns true when no coordinate is known.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.version.is_none() && self.license.is_none()
    }
}

/// A scored origin, the externally visible result unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Normalized origin URL.
    pub origin_url: String,
    /// How the match was established.
    pub match_type: MatchType,
    /// Similarity (1.0 for exact matches).
    pub similarity: f64,
    /// Popularity signal.
    pub frequency_rank: u64,
    /// Whether the origin belongs to the project's official organization.
    pub is_official_org: bool,
    /// Last known activity of the origin.
    pub last_activity: Option<DateTime<Utc>>,
    /// Final probability in `[0, 1]`.
    pub confidence: f64,
    /// Strategy that produced the underlying origin.
    pub strategy: StrategyKind,
    /// Identifier the provider matched on, if any.
    pub matched_identifier: Option<ContentIdentifier>,
    /// Local directory that was matched.
    pub candidate_path: PathBuf,
    /// Package coordinates from enrichment.
    #[serde(default, skip_serializing_if = "PackageCoordinates::is_empty")]
    pub coordinates: PackageCoordinates,
    /// Package URL, generated for high-confidence matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
}

/// Outcome of one discovery run.
///
/// A run that hit its wall-clock timeout still returns the matches gathered
/// so far with `timed_out` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Unique run identifier.
    pub run_id: String,
    /// Ranked matches above the confidence threshold.
    pub matches: Vec<MatchRecord>,
    /// Number of directory candidates looked up.
    pub candidates_scanned: usize,
    /// Strategies that were dispatched, in order.
    pub strategies_run: Vec<StrategyKind>,
    /// Provider calls that degraded to an empty result.
    pub provider_failures: usize,
    /// Whether the wall-clock timeout expired.
    pub timed_out: bool,
    /// Total run time in milliseconds.
    pub duration_ms: u64,
}

impl DiscoveryReport {
    /// Highest ranked match, if any.
    #[must_use]
    pub fn best(&self) -> Option<&MatchRecord> {
        self.matches.first()
    }

    /// Returns true when no match cleared the threshold.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
