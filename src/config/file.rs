//! TOML file structure.

use super::{CacheConfig, FuzzyConfig, RetryConfig};
use crate::providers::StrategyKind;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration file structure (for TOML parsing).
///
/// Every field is optional; missing fields keep their defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Ordered strategy names.
    pub strategies: Option<Vec<String>>,
    /// Report threshold.
    pub confidence_threshold: Option<f64>,
    /// Package URL threshold.
    pub purl_threshold: Option<f64>,
    /// Scan depth.
    pub max_depth: Option<usize>,
    /// Minimum relevant files.
    pub min_files: Option<usize>,
    /// Subdirectory candidate cap.
    pub max_subdirectory_candidates: Option<usize>,
    /// Run timeout in seconds.
    pub total_timeout_secs: Option<u64>,
    /// Per-call timeout in seconds.
    pub provider_timeout_secs: Option<u64>,
    /// Worker pool size.
    pub concurrency_limit: Option<usize>,
    /// Batch check size.
    pub batch_size: Option<usize>,
    /// Maximum reported matches.
    pub max_results: Option<usize>,
    /// Early termination switch.
    pub early_termination: Option<bool>,
    /// Names excluded from tree hashing.
    pub hash_excludes: Option<Vec<String>>,
    /// Fuzzy section.
    pub fuzzy: Option<ConfigFileFuzzy>,
    /// Cache section.
    pub cache: Option<ConfigFileCache>,
    /// Retry section.
    pub retry: Option<ConfigFileRetry>,
}

/// Fuzzy section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileFuzzy {
    /// Enable fuzzy matching.
    pub enabled: Option<bool>,
    /// Tier 1 threshold.
    pub file_set_threshold: Option<f64>,
    /// Acceptance threshold.
    pub acceptance_threshold: Option<f64>,
}

impl ConfigFileFuzzy {
    pub(super) fn apply(self, target: &mut FuzzyConfig) {
        if let Some(v) = self.enabled {
            target.enabled = v;
        }
        if let Some(v) = self.file_set_threshold {
            target.file_set_threshold = v;
        }
        if let Some(v) = self.acceptance_threshold {
            target.acceptance_threshold = v;
        }
    }
}

/// Cache section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileCache {
    /// Enable caching.
    pub enabled: Option<bool>,
    /// In-memory capacity.
    pub capacity: Option<usize>,
    /// Persistence directory.
    pub directory: Option<String>,
    /// Per-strategy TTL in seconds, keyed by strategy name.
    pub ttl_secs: Option<HashMap<String, u64>>,
}

impl ConfigFileCache {
    pub(super) fn apply(self, target: &mut CacheConfig) -> Result<()> {
        if let Some(v) = self.enabled {
            target.enabled = v;
        }
        if let Some(v) = self.capacity {
            target.capacity = v;
        }
        if let Some(v) = self.directory {
            target.directory = Some(PathBuf::from(v));
        }
        if let Some(ttls) = self.ttl_secs {
            for (name, secs) in ttls {
                let strategy = name
                    .parse::<StrategyKind>()
                    .map_err(|e| Error::Configuration(e.to_string()))?;
                target
                    .ttl_overrides
                    .insert(strategy, Duration::from_secs(secs));
            }
        }
        Ok(())
    }
}

/// Retry section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileRetry {
    /// Maximum retries.
    pub max_retries: Option<u32>,
    /// Base backoff in milliseconds.
    pub backoff_ms: Option<u64>,
}

impl ConfigFileRetry {
    pub(super) fn apply(self, target: &mut RetryConfig) {
        if let Some(v) = self.max_retries {
            target.max_retries = v;
        }
        if let Some(v) = self.backoff_ms {
            target.backoff = Duration::from_millis(v);
        }
    }
}
