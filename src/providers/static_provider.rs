//! In-memory provider.
//!
//! Serves origins from fixed tables. Useful for offline fixtures (for example
//! a pre-exported archive snapshot) and for exercising the orchestrator
//! without network access. Latency and failures can be injected.

use super::{ProviderClient, ProviderError, ProviderResult};
use crate::models::{ContentIdentifier, OriginCandidate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Provider backed by in-memory tables.
///
/// # Example
///
/// ```rust
/// use srcorigin::models::{ContentIdentifier, ObjectKind, OriginCandidate};
/// use srcorigin::providers::StaticProvider;
///
/// let id = ContentIdentifier::new(ObjectKind::Tree, [9; 32]);
/// let provider = StaticProvider::new("fixture")
///     .with_origin(id, OriginCandidate::new("https://github.com/curl/curl", "archive"));
/// assert_eq!(provider.call_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct StaticProvider {
    name: String,
    by_identifier: HashMap<ContentIdentifier, Vec<OriginCandidate>>,
    by_keyword: HashMap<String, Vec<OriginCandidate>>,
    batch: bool,
    latency: Option<Duration>,
    failure: Option<ProviderError>,
    calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl StaticProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an origin returned for an identifier query.
    #[must_use]
    pub fn with_origin(mut self, id: ContentIdentifier, origin: OriginCandidate) -> Self {
        self.by_identifier.entry(id).or_default().push(origin);
        self
    }

    /// Adds an origin returned for a keyword query (case-insensitive).
    #[must_use]
    pub fn with_keyword_origin(mut self, keyword: &str, origin: OriginCandidate) -> Self {
        self.by_keyword
            .entry(keyword.to_lowercase())
            .or_default()
            .push(origin);
        self
    }

    /// Enables batched existence checks.
    #[must_use]
    pub const fn with_batch_support(mut self, enabled: bool) -> Self {
        self.batch = enabled;
        self
    }

    /// Delays every call.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every call fail with the given error.
    #[must_use]
    pub fn with_failure(mut self, error: ProviderError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of search calls served (successful or not).
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of batch checks served.
    #[must_use]
    pub fn batch_call_count(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    async fn simulate(&self) -> ProviderResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProviderClient for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search_by_content_identifier(
        &self,
        id: &ContentIdentifier,
    ) -> ProviderResult<Vec<OriginCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(self.by_identifier.get(id).cloned().unwrap_or_default())
    }

    async fn search_by_keyword(&self, text: &str) -> ProviderResult<Vec<OriginCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(self
            .by_keyword
            .get(&text.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn batch_check(
        &self,
        ids: &[ContentIdentifier],
    ) -> ProviderResult<HashMap<ContentIdentifier, bool>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(ids
            .iter()
            .map(|id| (*id, self.by_identifier.contains_key(id)))
            .collect())
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }
}
