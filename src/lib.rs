//! # Srcorigin
//!
//! Estimates the probable upstream origin of an arbitrary source directory.
//!
//! Srcorigin names directories by content (a Merkle identifier independent of
//! filesystem metadata), asks a configurable, ordered list of search
//! strategies where that content has been seen before, falls back to tiered
//! fuzzy matching when exact lookups miss, and returns ranked, probabilistic
//! matches. Results are never certain; every match carries a confidence.
//!
//! ## Features
//!
//! - Deterministic, platform-independent content identifiers
//! - Ordered strategies with bounded concurrency and early termination
//! - Three-tier fuzzy matcher (file set, structure, content)
//! - Pure multi-factor confidence scoring
//! - TTL result cache with optional on-disk persistence
//! - Graceful degradation: provider failures and timeouts never abort a run
//!
//! ## Example
//!
//! ```rust,ignore
//! use srcorigin::{DiscoveryConfig, DiscoveryOrchestrator, ProviderRegistry, ResultCache, StrategyKind};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = DiscoveryConfig::default().with_strategies(vec![StrategyKind::Archive]);
//! let registry = ProviderRegistry::new().with_provider(StrategyKind::Archive, archive_client);
//! let cache = Arc::new(ResultCache::from_config(&config.cache)?);
//! let orchestrator = DiscoveryOrchestrator::new(config, registry, cache)?;
//! let report = orchestrator.discover(Path::new("./vendor/zlib")).await?;
//! for m in &report.matches {
//!     println!("{} {:.2}", m.origin_url, m.confidence);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod providers;
pub mod services;
pub mod storage;

pub use config::{CacheConfig, DiscoveryConfig, FuzzyConfig, RetryConfig};
pub use models::{
    ContentIdentifier, DirectoryCandidate, DirectoryManifest, DiscoveryReport, MatchRecord,
    MatchType, ObjectKind, OriginCandidate,
};
pub use providers::{ProviderClient, ProviderError, ProviderRegistry, StrategyKind};
pub use services::{
    AddressingError, CandidateScanner, ConfidenceScorer, ContentAddresser, DiscoveryOrchestrator,
    FuzzyMatcher,
};
pub use storage::{CacheError, ResultCache};

/// Error type for srcorigin operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Configuration` | Invalid thresholds, unknown strategy, missing provider, bad root |
/// | `Input` | Hashing a path fails (I/O or symlink cycle) |
/// | `Provider` | A provider call fails |
/// | `Cache` | A persisted cache entry cannot be read or written |
/// | `OperationFailed` | Logging/metrics setup or config file I/O fails |
///
/// [`DiscoveryOrchestrator::discover`] only ever returns `Configuration`;
/// every other failure is absorbed inside the run.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Configuration is invalid.
    ///
    /// Raised when:
    /// - A threshold lies outside `[0, 1]`
    /// - A strategy name is unknown, duplicated, or lacks a provider
    /// - Concurrency, batch size, cache capacity, or a timeout is zero
    /// - The scan root does not exist or is not a directory
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A path could not be content-addressed.
    #[error("input error: {0}")]
    Input(#[from] AddressingError),

    /// A provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The result cache failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for srcorigin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Returns 0 if the system clock is before the Unix epoch.
///
/// # Example
///
/// ```rust
/// use srcorigin::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
