//! Tiered fuzzy matching.
//!
//! Used when a provider returns a reference tree whose identifier differs
//! from the local candidate's. Each tier gates the next:
//!
//! | Tier | Measure | Role |
//! |------|---------|------|
//! | 1 | Jaccard of relative file paths | recall filter, below threshold ⇒ discard |
//! | 2 | tree-shape similarity | weight 0.6 |
//! | 3 | Jaccard of per-file blob identifiers | weight 0.4 |
//!
//! `similarity = 0.6 * tier2 + 0.4 * tier3`. Empty file sets score 0; a
//! manifest compared with itself scores exactly 1.

mod structure;

pub use structure::structural_similarity;

use crate::config::FuzzyConfig;
use crate::models::{DirectoryManifest, OriginCandidate};
use std::collections::BTreeSet;

/// Weight of the structural tier.
pub const STRUCTURE_WEIGHT: f64 = 0.6;

/// Weight of the content tier.
pub const CONTENT_WEIGHT: f64 = 0.4;

/// Per-tier scores of one comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierScores {
    /// Tier 1: file-path Jaccard.
    pub file_set: f64,
    /// Tier 2: structural similarity.
    pub structure: f64,
    /// Tier 3: content Jaccard.
    pub content: f64,
}

/// Result of comparing a local manifest with a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch {
    /// Blended similarity in `[0, 1]`.
    pub similarity: f64,
    /// Individual tier scores.
    pub tiers: TierScores,
}

impl FuzzyMatch {
    /// Whether the reference is indistinguishable from the local tree.
    #[must_use]
    pub fn is_exact_equivalent(&self) -> bool {
        self.similarity >= 1.0
    }
}

/// Three-tier similarity scorer.
///
/// # Example
///
/// ```rust
/// use srcorigin::config::FuzzyConfig;
/// use srcorigin::services::{ContentAddresser, FuzzyMatcher};
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("a.c"), b"a").unwrap();
/// let manifest = ContentAddresser::new().manifest(dir.path()).unwrap();
///
/// let matcher = FuzzyMatcher::new(FuzzyConfig::default());
/// assert_eq!(matcher.similarity(&manifest, &manifest), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    config: FuzzyConfig,
}

impl FuzzyMatcher {
    /// Creates a matcher.
    #[must_use]
    pub const fn new(config: FuzzyConfig) -> Self {
        Self { config }
    }

    /// Matcher settings.
    #[must_use]
    pub const fn config(&self) -> &FuzzyConfig {
        &self.config
    }

    /// Runs all tiers; `None` when the reference fails the tier-1 gate.
    ///
    /// A reference with no file paths in common never passes the gate, even
    /// with a zero threshold.
    #[must_use]
    pub fn compare(&self, local: &DirectoryManifest, reference: &DirectoryManifest) -> Option<FuzzyMatch> {
        if local.is_empty() || reference.is_empty() {
            return None;
        }
        if local.root == reference.root {
            return Some(FuzzyMatch {
                similarity: 1.0,
                tiers: TierScores {
                    file_set: 1.0,
                    structure: 1.0,
                    content: 1.0,
                },
            });
        }

        let file_set = jaccard(
            &local.files.keys().collect::<BTreeSet<_>>(),
            &reference.files.keys().collect::<BTreeSet<_>>(),
        );
        if file_set <= 0.0 || file_set < self.config.file_set_threshold {
            tracing::trace!(file_set, "Reference rejected by file-set gate");
            return None;
        }

        let structure = structural_similarity(local, reference);
        let content = jaccard(&local.content_set(), &reference.content_set());
        let similarity = STRUCTURE_WEIGHT
            .mul_add(structure, CONTENT_WEIGHT * content)
            .clamp(0.0, 1.0);

        Some(FuzzyMatch {
            similarity,
            tiers: TierScores {
                file_set,
                structure,
                content,
            },
        })
    }

    /// Blended similarity, 0 when the reference fails the gate.
    #[must_use]
    pub fn similarity(&self, local: &DirectoryManifest, reference: &DirectoryManifest) -> f64 {
        self.compare(local, reference).map_or(0.0, |m| m.similarity)
    }

    /// Compares and applies the acceptance threshold.
    #[must_use]
    pub fn accept(&self, local: &DirectoryManifest, reference: &DirectoryManifest) -> Option<FuzzyMatch> {
        self.compare(local, reference)
            .filter(|m| m.similarity >= self.config.acceptance_threshold)
    }

    /// Scores every origin that carries a reference manifest, keeping those
    /// at or above the acceptance threshold, best first.
    #[must_use]
    pub fn rank<'a>(
        &self,
        local: &DirectoryManifest,
        origins: &'a [OriginCandidate],
    ) -> Vec<(&'a OriginCandidate, FuzzyMatch)> {
        let mut accepted: Vec<_> = origins
            .iter()
            .filter_map(|origin| {
                let reference = origin.reference.as_ref()?;
                self.accept(local, reference).map(|m| (origin, m))
            })
            .collect();
        accepted.sort_by(|a, b| {
            b.1.similarity
                .total_cmp(&a.1.similarity)
                .then_with(|| a.0.origin_url.cmp(&b.0.origin_url))
        });
        accepted
    }
}

/// `|A ∩ B| / |A ∪ B|`, 0 for two empty sets.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
