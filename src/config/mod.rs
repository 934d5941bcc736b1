//! Configuration management.
//!
//! Configuration is assembled in three layers: compiled defaults, an optional
//! TOML file, and `SRCORIGIN_*` environment overrides. Everything is checked
//! by [`DiscoveryConfig::validate`] before any scanning starts.
//!
//! # Example file
//!
//! ```toml
//! strategies = ["archive", "keyword_search"]
//! confidence_threshold = 0.7
//! concurrency_limit = 8
//! total_timeout_secs = 60
//!
//! [fuzzy]
//! file_set_threshold = 0.25
//!
//! [cache]
//! directory = "/var/cache/srcorigin"
//!
//! [cache.ttl_secs]
//! keyword_search = 600
//! ```

mod file;

pub use file::{ConfigFile, ConfigFileCache, ConfigFileFuzzy, ConfigFileRetry};

use crate::providers::StrategyKind;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fuzzy matching configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyConfig {
    /// Whether exact misses are fuzzy matched at all.
    pub enabled: bool,
    /// Minimum file-path Jaccard similarity for a reference to reach tiers 2 and 3.
    pub file_set_threshold: f64,
    /// Minimum blended score for a fuzzy match to be reported.
    pub acceptance_threshold: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_set_threshold: 0.2,
            acceptance_threshold: 0.5,
        }
    }
}

/// Retry policy for rate-limited provider calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff, doubled per attempt.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Whether results are cached.
    pub enabled: bool,
    /// Maximum in-memory entries.
    pub capacity: usize,
    /// Directory for persisted entries; `None` keeps the cache in memory.
    pub directory: Option<PathBuf>,
    /// Per-strategy TTL overrides.
    pub ttl_overrides: HashMap<StrategyKind, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            directory: None,
            ttl_overrides: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// TTL for a strategy: override if configured, else the strategy default.
    #[must_use]
    pub fn ttl_for(&self, strategy: StrategyKind) -> Duration {
        self.ttl_overrides
            .get(&strategy)
            .copied()
            .unwrap_or_else(|| strategy.default_ttl())
    }

    /// Default on-disk location (`<user cache dir>/srcorigin/results`).
    #[must_use]
    pub fn default_directory() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "srcorigin")
            .map(|dirs| dirs.cache_dir().join("results"))
    }
}

/// Top-level discovery configuration.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `SRCORIGIN_STRATEGIES` | list | `archive,fingerprint,hash_search,keyword_search` | Ordered strategies |
/// | `SRCORIGIN_CONFIDENCE_THRESHOLD` | f64 | `0.65` | Report threshold |
/// | `SRCORIGIN_MAX_DEPTH` | usize | `5` | Parent / subdirectory depth |
/// | `SRCORIGIN_MIN_FILES` | usize | `3` | Minimum relevant files |
/// | `SRCORIGIN_CONCURRENCY` | usize | `5` | Worker pool size |
/// | `SRCORIGIN_TOTAL_TIMEOUT_SECS` | u64 | `120` | Run wall-clock limit |
/// | `SRCORIGIN_PROVIDER_TIMEOUT_SECS` | u64 | `30` | Per-call limit |
/// | `SRCORIGIN_EARLY_TERMINATION` | bool | `true` | Skip resolved candidates |
/// | `SRCORIGIN_CACHE_ENABLED` | bool | `true` | Enable result cache |
/// | `SRCORIGIN_CACHE_DIR` | path | unset | Persist cache entries |
///
/// # Example
///
/// ```rust
/// use srcorigin::config::DiscoveryConfig;
///
/// let config = DiscoveryConfig::default();
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_depth, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    /// Enabled strategies in priority order.
    pub strategies: Vec<StrategyKind>,
    /// Minimum confidence for a match to be reported.
    pub confidence_threshold: f64,
    /// Minimum confidence for a Package URL to be generated.
    pub purl_threshold: f64,
    /// Maximum levels walked above and below the scan origin.
    pub max_depth: usize,
    /// Minimum relevant-file count for a directory to become a candidate.
    pub min_files: usize,
    /// Maximum number of subdirectory candidates.
    pub max_subdirectory_candidates: usize,
    /// Wall-clock limit for a whole run.
    pub total_timeout: Duration,
    /// Limit for a single provider call.
    pub provider_timeout: Duration,
    /// Worker pool size for provider calls.
    pub concurrency_limit: usize,
    /// Maximum identifiers per batch check.
    pub batch_size: usize,
    /// Maximum number of reported matches.
    pub max_results: usize,
    /// Skip lower-priority strategies for candidates that already have a
    /// confident exact match.
    pub early_termination: bool,
    /// Names excluded from tree hashing.
    pub hash_excludes: Vec<String>,
    /// Fuzzy matching settings.
    pub fuzzy: FuzzyConfig,
    /// Cache settings.
    pub cache: CacheConfig,
    /// Rate-limit retry settings.
    pub retry: RetryConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            strategies: StrategyKind::all().to_vec(),
            confidence_threshold: 0.65,
            purl_threshold: 0.85,
            max_depth: 5,
            min_files: 3,
            max_subdirectory_candidates: 32,
            total_timeout: Duration::from_secs(120),
            provider_timeout: Duration::from_secs(30),
            concurrency_limit: 5,
            batch_size: 100,
            max_results: 10,
            early_termination: true,
            hash_excludes: crate::services::DEFAULT_HASH_EXCLUDES
                .iter()
                .map(ToString::to_string)
                .collect(),
            fuzzy: FuzzyConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// unknown strategy.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from TOML text on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for malformed TOML or unknown strategies.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("invalid config file: {e}")))?;
        Self::default().merge_file(file)
    }

    /// Applies a parsed config file over this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file names an unknown strategy.
    pub fn merge_file(mut self, file: ConfigFile) -> Result<Self> {
        if let Some(names) = file.strategies {
            self.strategies = parse_strategy_names(&names)?;
        }
        if let Some(v) = file.confidence_threshold {
            self.confidence_threshold = v;
        }
        if let Some(v) = file.purl_threshold {
            self.purl_threshold = v;
        }
        if let Some(v) = file.max_depth {
            self.max_depth = v;
        }
        if let Some(v) = file.min_files {
            self.min_files = v;
        }
        if let Some(v) = file.max_subdirectory_candidates {
            self.max_subdirectory_candidates = v;
        }
        if let Some(v) = file.total_timeout_secs {
            self.total_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.provider_timeout_secs {
            self.provider_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.concurrency_limit {
            self.concurrency_limit = v;
        }
        if let Some(v) = file.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = file.max_results {
            self.max_results = v;
        }
        if let Some(v) = file.early_termination {
            self.early_termination = v;
        }
        if let Some(v) = file.hash_excludes {
            self.hash_excludes = v;
        }
        if let Some(fuzzy) = file.fuzzy {
            fuzzy.apply(&mut self.fuzzy);
        }
        if let Some(retry) = file.retry {
            retry.apply(&mut self.retry);
        }
        if let Some(cache) = file.cache {
            cache.apply(&mut self.cache)?;
        }
        Ok(self)
    }

    /// Applies `SRCORIGIN_*` environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `SRCORIGIN_STRATEGIES` names an
    /// unknown strategy. Unparseable numeric values are ignored.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(v) = std::env::var("SRCORIGIN_STRATEGIES") {
            let names: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
            self.strategies = parse_strategy_names(&names)?;
        }
        if let Some(v) = env_parse("SRCORIGIN_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = v;
        }
        if let Some(v) = env_parse("SRCORIGIN_MAX_DEPTH") {
            self.max_depth = v;
        }
        if let Some(v) = env_parse("SRCORIGIN_MIN_FILES") {
            self.min_files = v;
        }
        if let Some(v) = env_parse("SRCORIGIN_CONCURRENCY") {
            self.concurrency_limit = v;
        }
        if let Some(v) = env_parse("SRCORIGIN_TOTAL_TIMEOUT_SECS") {
            self.total_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("SRCORIGIN_PROVIDER_TIMEOUT_SECS") {
            self.provider_timeout = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("SRCORIGIN_EARLY_TERMINATION") {
            self.early_termination = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("SRCORIGIN_CACHE_ENABLED") {
            self.cache.enabled = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("SRCORIGIN_CACHE_DIR") {
            self.cache.directory = Some(PathBuf::from(v));
        }
        Ok(self)
    }

    /// Checks every setting, before any scanning begins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("confidence_threshold", self.confidence_threshold)?;
        check_unit_interval("purl_threshold", self.purl_threshold)?;
        check_unit_interval("fuzzy.file_set_threshold", self.fuzzy.file_set_threshold)?;
        check_unit_interval("fuzzy.acceptance_threshold", self.fuzzy.acceptance_threshold)?;

        if self.strategies.is_empty() {
            return Err(Error::Configuration("no strategies enabled".to_string()));
        }
        for (i, strategy) in self.strategies.iter().enumerate() {
            if self.strategies[..i].contains(strategy) {
                return Err(Error::Configuration(format!(
                    "strategy '{strategy}' listed more than once"
                )));
            }
        }
        if self.concurrency_limit == 0 {
            return Err(Error::Configuration(
                "concurrency_limit must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration("batch_size must be positive".to_string()));
        }
        if self.total_timeout.is_zero() || self.provider_timeout.is_zero() {
            return Err(Error::Configuration("timeouts must be positive".to_string()));
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(Error::Configuration(
                "cache.capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the ordered strategy list from names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on an unknown name.
    pub fn with_strategy_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        self.strategies = parse_strategy_names(names)?;
        Ok(self)
    }

    /// Sets the ordered strategy list.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<StrategyKind>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Sets the confidence threshold.
    #[must_use]
    pub const fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Sets the maximum scan depth.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the minimum relevant-file count.
    #[must_use]
    pub const fn with_min_files(mut self, min_files: usize) -> Self {
        self.min_files = min_files;
        self
    }

    /// Sets the run timeout.
    #[must_use]
    pub const fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = timeout;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub const fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Enables or disables early termination.
    #[must_use]
    pub const fn with_early_termination(mut self, enabled: bool) -> Self {
        self.early_termination = enabled;
        self
    }

    /// Sets the maximum number of reported matches.
    #[must_use]
    pub const fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Replaces the fuzzy settings.
    #[must_use]
    pub const fn with_fuzzy(mut self, fuzzy: FuzzyConfig) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// Replaces the cache settings.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

fn parse_strategy_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<StrategyKind>> {
    names
        .iter()
        .map(|name| {
            name.as_ref()
                .parse::<StrategyKind>()
                .map_err(|e| Error::Configuration(e.to_string()))
        })
        .collect()
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
