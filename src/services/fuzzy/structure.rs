//! Tree-shape comparison.
//!
//! A manifest's shape is summarised by two histograms:
//!
//! - **depth profile**: number of files at each depth (`a.c` is depth 0,
//!   `src/a.c` depth 1)
//! - **branching profile**: number of directories with each child count
//!   (files plus subdirectories), root included
//!
//! Two histograms are compared with the weighted Jaccard (Ruzicka)
//! similarity `Σ min(a_k, b_k) / Σ max(a_k, b_k)`. The structural similarity
//! is the mean of the depth and branching similarities. Both measures are
//! symmetric, lie in `[0, 1]`, equal 1 for identical shapes, and ignore file
//! names and content entirely.

use crate::models::DirectoryManifest;
use std::collections::{BTreeMap, BTreeSet};

type Histogram = BTreeMap<usize, usize>;

/// Structural similarity of two manifests in `[0, 1]`.
#[must_use]
pub fn structural_similarity(a: &DirectoryManifest, b: &DirectoryManifest) -> f64 {
    let depth = weighted_jaccard(&depth_profile(a), &depth_profile(b));
    let branching = weighted_jaccard(&branching_profile(a), &branching_profile(b));
    (depth + branching) / 2.0
}

/// Files per depth.
pub(super) fn depth_profile(manifest: &DirectoryManifest) -> Histogram {
    let mut histogram = Histogram::new();
    for path in manifest.files.keys() {
        *histogram.entry(path.matches('/').count()).or_default() += 1;
    }
    histogram
}

/// Directories per child count.
pub(super) fn branching_profile(manifest: &DirectoryManifest) -> Histogram {
    let mut children: BTreeMap<&str, usize> = BTreeMap::new();
    children.insert("", 0);
    for dir in &manifest.directories {
        children.entry(dir.as_str()).or_default();
    }
    for path in manifest.files.keys().chain(manifest.directories.iter()) {
        let parent = path.rsplit_once('/').map_or("", |(parent, _)| parent);
        *children.entry(parent).or_default() += 1;
    }

    let mut histogram = Histogram::new();
    for count in children.into_values() {
        *histogram.entry(count).or_default() += 1;
    }
    histogram
}

#[allow(clippy::cast_precision_loss)]
fn weighted_jaccard(a: &Histogram, b: &Histogram) -> f64 {
    let mut min_sum = 0usize;
    let mut max_sum = 0usize;
    let keys: BTreeSet<&usize> = a.keys().chain(b.keys()).collect();
    for key in keys {
        let x = a.get(key).copied().unwrap_or(0);
        let y = b.get(key).copied().unwrap_or(0);
        min_sum += x.min(y);
        max_sum += x.max(y);
    }
    if max_sum == 0 {
        return 1.0;
    }
    min_sum as f64 / max_sum as f64
}
