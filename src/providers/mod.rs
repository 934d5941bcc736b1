//! Origin search providers.
//!
//! Concrete search services (archive lookups, fingerprint matchers, code
//! search APIs) live outside this crate. The engine consumes them through the
//! [`ProviderClient`] capability and selects them through a closed set of
//! [`StrategyKind`] variants whose order is pure configuration.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ DiscoveryOrchestrator│────▶│ ProviderRegistry │────▶│ dyn ProviderClient│
//! │ (ordered strategies) │     │ StrategyKind → P │     │ (external)        │
//! └──────────┬───────────┘     └──────────────────┘     └──────────────────┘
//!            │ every call goes through
//!            ▼
//!  ResilientCaller: per-call timeout, cancellation, rate-limit retry
//! ```

mod registry;
mod resilience;
mod static_provider;

pub use registry::ProviderRegistry;
pub use resilience::ResilientCaller;
pub use static_provider::StaticProvider;

use crate::models::{ContentIdentifier, OriginCandidate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a provider.
///
/// The orchestrator treats every variant the same way: the affected
/// strategy/candidate pair yields an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider asked the caller to slow down.
    #[error("rate limited{}", retry_hint(.retry_after.as_ref()))]
    RateLimited {
        /// Suggested wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The call did not finish in time (or was cancelled).
    #[error("provider call timed out")]
    Timeout,

    /// The provider has no record for the query.
    #[error("not found")]
    NotFound,

    /// Network or protocol failure.
    #[error("transport error: {0}")]
    TransportError(String),
}

impl ProviderError {
    /// Short label used in metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
            Self::TransportError(_) => "transport_error",
        }
    }
}

fn retry_hint(retry_after: Option<&Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}ms)", d.as_millis()))
        .unwrap_or_default()
}

/// Result alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// External origin-search capability.
///
/// Implementations must be stateless per invocation; they may be called from
/// many worker tasks at once.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Finds origins containing the given identifier.
    async fn search_by_content_identifier(
        &self,
        id: &ContentIdentifier,
    ) -> ProviderResult<Vec<OriginCandidate>>;

    /// Finds origins by free-text query.
    async fn search_by_keyword(&self, text: &str) -> ProviderResult<Vec<OriginCandidate>>;

    /// Checks which identifiers the provider knows about.
    ///
    /// Identifiers missing from the returned map are treated as unknown and
    /// searched individually.
    async fn batch_check(
        &self,
        ids: &[ContentIdentifier],
    ) -> ProviderResult<HashMap<ContentIdentifier, bool>> {
        Ok(ids.iter().map(|id| (*id, true)).collect())
    }

    /// Whether [`ProviderClient::batch_check`] is a real batched lookup.
    fn supports_batch(&self) -> bool {
        false
    }
}

/// How a strategy queries its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Query by the candidate's tree identifier.
    Identifier,
    /// Query by the candidate directory name.
    Keyword,
}

/// Discovery strategies.
///
/// The set is closed; which strategies run, and in which order, is decided by
/// configuration only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Archive lookup by directory identifier.
    Archive,
    /// Fingerprint-matching service.
    Fingerprint,
    /// Hash search across code hosts.
    HashSearch,
    /// Repository keyword search.
    KeywordSearch,
}

impl StrategyKind {
    /// All strategies.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Archive,
            Self::Fingerprint,
            Self::HashSearch,
            Self::KeywordSearch,
        ]
    }

    /// Canonical configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Fingerprint => "fingerprint",
            Self::HashSearch => "hash_search",
            Self::KeywordSearch => "keyword_search",
        }
    }

    /// Query mode used by this strategy.
    #[must_use]
    pub const fn query_mode(self) -> QueryMode {
        match self {
            Self::KeywordSearch => QueryMode::Keyword,
            Self::Archive | Self::Fingerprint | Self::HashSearch => QueryMode::Identifier,
        }
    }

    /// Default result TTL. Archival data changes slowly, live search quickly.
    #[must_use]
    pub const fn default_ttl(self) -> Duration {
        match self {
            Self::Archive => Duration::from_secs(7 * 24 * 3600),
            Self::Fingerprint | Self::HashSearch => Duration::from_secs(24 * 3600),
            Self::KeywordSearch => Duration::from_secs(3600),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown strategy names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown strategy '{0}'")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "archive" | "swh" | "software_heritage" => Ok(Self::Archive),
            "fingerprint" | "scanoss" => Ok(Self::Fingerprint),
            "hash_search" | "hash" => Ok(Self::HashSearch),
            "keyword_search" | "keyword" | "web_search" => Ok(Self::KeywordSearch),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}
