//! Local directory candidates and provider-reported origins.

use super::{ContentIdentifier, DirectoryManifest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Where a candidate sits relative to the scan origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateRelation {
    /// The scan origin itself.
    Origin,
    /// An ancestor of the scan origin.
    Ancestor,
    /// A descendant of the scan origin.
    Descendant,
}

/// A local directory worth looking up.
///
/// Produced once by the scanner and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryCandidate {
    path: PathBuf,
    identifier: ContentIdentifier,
    depth: usize,
    relation: CandidateRelation,
    file_count: usize,
    specificity_score: f64,
}

impl DirectoryCandidate {
    /// Creates a candidate; specificity is derived from `depth`.
    #[must_use]
    pub fn new(
        path: PathBuf,
        identifier: ContentIdentifier,
        depth: usize,
        relation: CandidateRelation,
        file_count: usize,
    ) -> Self {
        Self {
            path,
            identifier,
            depth,
            relation,
            file_count,
            specificity_score: specificity_for_depth(depth),
        }
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tree identifier of the directory.
    #[must_use]
    pub const fn identifier(&self) -> &ContentIdentifier {
        &self.identifier
    }

    /// Distance from the scan origin.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Relation to the scan origin.
    #[must_use]
    pub const fn relation(&self) -> CandidateRelation {
        self.relation
    }

    /// Number of relevant source files below the directory.
    #[must_use]
    pub const fn file_count(&self) -> usize {
        self.file_count
    }

    /// `1 / (depth + 1)`.
    #[must_use]
    pub const fn specificity_score(&self) -> f64 {
        self.specificity_score
    }

    /// Final path component, used as keyword query text.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Specificity of a candidate at `depth`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn specificity_for_depth(depth: usize) -> f64 {
    1.0 / (depth as f64 + 1.0)
}

/// One origin reported by a strategy invocation.
///
/// `matched_identifier` is the identifier the provider matched on. The result
/// is an exact hit when it equals the candidate's own tree identifier; any
/// other result is a reference that must go through fuzzy matching, which
/// requires `reference` to be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginCandidate {
    /// Origin URL as reported by the provider.
    pub origin_url: String,
    /// Identifier the provider matched.
    pub matched_identifier: Option<ContentIdentifier>,
    /// Name of the strategy that produced this result.
    pub strategy_name: String,
    /// Provider-specific metadata.
    #[serde(default)]
    pub raw_metadata: Map<String, Value>,
    /// When the provider observed this result.
    pub observed_at: DateTime<Utc>,
    /// Reference tree for fuzzy comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<DirectoryManifest>,
}

impl OriginCandidate {
    /// Creates an origin candidate observed now.
    #[must_use]
    pub fn new(origin_url: impl Into<String>, strategy_name: impl Into<String>) -> Self {
        Self {
            origin_url: origin_url.into(),
            matched_identifier: None,
            strategy_name: strategy_name.into(),
            raw_metadata: Map::new(),
            observed_at: Utc::now(),
            reference: None,
        }
    }

    /// Sets the matched identifier.
    #[must_use]
    pub const fn with_identifier(mut self, identifier: ContentIdentifier) -> Self {
        self.matched_identifier = Some(identifier);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.raw_metadata.insert(key.into(), value.into());
        self
    }

    /// Attaches a reference manifest for fuzzy matching.
    #[must_use]
    pub fn with_reference(mut self, reference: DirectoryManifest) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Returns a metadata value as a string.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.raw_metadata.get(key).and_then(Value::as_str)
    }

    /// Returns a metadata value as an unsigned integer.
    #[must_use]
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.raw_metadata.get(key).and_then(Value::as_u64)
    }

    /// Returns a metadata value as a bool.
    #[must_use]
    pub fn metadata_bool(&self, key: &str) -> Option<bool> {
        self.raw_metadata.get(key).and_then(Value::as_bool)
    }
}
