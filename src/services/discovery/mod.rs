//! Multi-strategy origin discovery.
//!
//! # Pipeline
//!
//! ```text
//! root ──▶ CandidateScanner ──▶ for strategy in configured order:
//!                                  outstanding candidates
//!                                    │ batch pre-check (if supported)
//!                                    │ ResultCache ─miss─▶ ResilientCaller ─▶ ProviderClient
//!                                    ▼
//!                                  exact hit? ──no──▶ FuzzyMatcher
//!                                    │
//!                                  mark resolved (early termination)
//!        ──▶ ConfidenceScorer ──▶ dedupe by URL ──▶ rank ──▶ threshold/top-N ──▶ enrich
//! ```
//!
//! A wall-clock timer cancels the run token at `total_timeout`; whatever has
//! been gathered by then is still scored and returned with `timed_out` set.

mod ranking;

use crate::config::DiscoveryConfig;
use crate::models::{
    ContentIdentifier, DirectoryCandidate, DirectoryManifest, DiscoveryReport, MatchRecord,
    MatchType, OriginCandidate,
};
use crate::providers::{
    ProviderClient, ProviderError, ProviderRegistry, ProviderResult, QueryMode, ResilientCaller,
    StrategyKind,
};
use crate::services::addressing::ContentAddresser;
use crate::services::enrichment::{CoordinateExtractor, MetadataCoordinateExtractor, PurlGenerator};
use crate::services::fuzzy::FuzzyMatcher;
use crate::services::scanner::CandidateScanner;
use crate::services::scoring::ConfidenceScorer;
use crate::storage::{CacheKey, ResultCache};
use crate::{Error, Result};
use chrono::Utc;
use ranking::{Finding, Scored};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

/// Query sent to a provider for one candidate.
#[derive(Debug, Clone)]
enum Query {
    Identifier(ContentIdentifier),
    Keyword(String),
}

impl Query {
    fn for_candidate(strategy: StrategyKind, candidate: &DirectoryCandidate) -> Option<Self> {
        match strategy.query_mode() {
            QueryMode::Identifier => Some(Self::Identifier(*candidate.identifier())),
            QueryMode::Keyword => candidate.name().map(|n| Self::Keyword(n.to_string())),
        }
    }

    fn cache_key(&self, strategy: StrategyKind) -> CacheKey {
        match self {
            Self::Identifier(id) => CacheKey::for_identifier(strategy, id),
            Self::Keyword(text) => CacheKey::for_keyword(strategy, text),
        }
    }
}

/// Mutable state of one run, owned by the driving task.
#[derive(Default)]
struct RunState {
    findings: Vec<Finding>,
    resolved: HashSet<usize>,
    manifests: HashMap<usize, Option<Arc<DirectoryManifest>>>,
    strategies_run: Vec<StrategyKind>,
    provider_failures: usize,
}

/// Cancels the run token after the run timeout.
///
/// The timer task is aborted when the guard drops, including when the
/// `discover` future itself is dropped mid-run.
struct DeadlineTimer(JoinHandle<()>);

impl DeadlineTimer {
    fn start(token: CancellationToken, timeout: Duration) -> Self {
        Self(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            token.cancel();
        }))
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Top-level identification pipeline.
///
/// Holds no per-run state; one orchestrator can serve many concurrent
/// [`discover`](Self::discover) calls, all sharing the injected cache.
///
/// # Example
///
/// ```rust,no_run
/// use srcorigin::config::DiscoveryConfig;
/// use srcorigin::providers::{ProviderRegistry, StaticProvider, StrategyKind};
/// use srcorigin::services::DiscoveryOrchestrator;
/// use srcorigin::storage::ResultCache;
/// use std::sync::Arc;
///
/// # async fn run() -> srcorigin::Result<()> {
/// let config = DiscoveryConfig::default().with_strategies(vec![StrategyKind::Archive]);
/// let registry = ProviderRegistry::new()
///     .with_provider(StrategyKind::Archive, Arc::new(StaticProvider::new("archive")));
/// let cache = Arc::new(ResultCache::from_config(&config.cache)?);
///
/// let orchestrator = DiscoveryOrchestrator::new(config, registry, cache)?;
/// let report = orchestrator.discover("vendor/zlib".as_ref()).await?;
/// for m in &report.matches {
///     println!("{} {:.2}", m.origin_url, m.confidence);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DiscoveryOrchestrator {
    config: DiscoveryConfig,
    registry: ProviderRegistry,
    cache: Arc<ResultCache>,
    scanner: CandidateScanner,
    addresser: ContentAddresser,
    matcher: FuzzyMatcher,
    extractor: Arc<dyn CoordinateExtractor>,
    purl: PurlGenerator,
}

impl fmt::Debug for DiscoveryOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryOrchestrator")
            .field("strategies", &self.config.strategies)
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl DiscoveryOrchestrator {
    /// Creates an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configuration is invalid or an
    /// enabled strategy has no registered provider.
    pub fn new(config: DiscoveryConfig, registry: ProviderRegistry, cache: Arc<ResultCache>) -> Result<Self> {
        config.validate()?;
        if let Some(missing) = config.strategies.iter().find(|s| !registry.contains(**s)) {
            return Err(Error::Configuration(format!(
                "no provider registered for strategy '{missing}'"
            )));
        }

        Ok(Self {
            scanner: CandidateScanner::from_config(&config),
            addresser: ContentAddresser::with_excludes(&config.hash_excludes),
            matcher: FuzzyMatcher::new(config.fuzzy.clone()),
            extractor: Arc::new(MetadataCoordinateExtractor),
            purl: PurlGenerator::new(config.purl_threshold),
            config,
            registry,
            cache,
        })
    }

    /// Replaces the coordinate extractor used for enrichment.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn CoordinateExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Identifies the probable origins of `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `root` does not exist or is not a
    /// directory. Provider, cache and hashing failures never surface here.
    pub async fn discover(&self, root: &Path) -> Result<DiscoveryReport> {
        self.discover_with_cancellation(root, &CancellationToken::new())
            .await
    }

    /// Like [`discover`](Self::discover), but also stops when `parent` is
    /// cancelled. Cancellation degrades the run exactly like the timeout.
    ///
    /// # Errors
    ///
    /// Same as [`discover`](Self::discover).
    #[instrument(level = "info", skip(self, root, parent), fields(root = %root.display()))]
    #[allow(clippy::cast_possible_truncation)]
    pub async fn discover_with_cancellation(
        &self,
        root: &Path,
        parent: &CancellationToken,
    ) -> Result<DiscoveryReport> {
        let start = Instant::now();
        let root = resolve_root(root)?;
        let run_id = Uuid::now_v7().to_string();
        tracing::info!(run_id = %run_id, strategies = ?self.config.strategies, "Discovery started");

        let token = parent.child_token();
        let timer = DeadlineTimer::start(token.clone(), self.config.total_timeout);

        let candidates = Arc::new(self.scan(root, &token).await);
        metrics::counter!("discovery_candidates_total").increment(candidates.len() as u64);

        let scorer = ConfidenceScorer::at(Utc::now());
        let mut state = RunState::default();
        for &strategy in &self.config.strategies {
            if token.is_cancelled() {
                break;
            }
            let outstanding: Vec<usize> = (0..candidates.len())
                .filter(|i| !state.resolved.contains(i))
                .collect();
            if outstanding.is_empty() {
                tracing::debug!(strategy = %strategy, "All candidates resolved, skipping strategy");
                break;
            }
            state.strategies_run.push(strategy);
            self.run_strategy(strategy, &candidates, &outstanding, &token, &scorer, &mut state)
                .await;
        }

        let timed_out = token.is_cancelled();
        drop(timer);
        if timed_out {
            tracing::warn!(run_id = %run_id, "Discovery deadline reached, returning partial results");
        }

        let matches = self.finish(&state.findings, &candidates, &scorer);
        for m in &matches {
            metrics::counter!("discovery_matches_total", "match_type" => m.match_type.as_str())
                .increment(1);
        }
        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = if timed_out { "timed_out" } else { "completed" };
        metrics::counter!("discovery_runs_total", "outcome" => outcome).increment(1);
        tracing::info!(
            run_id = %run_id,
            matches = matches.len(),
            candidates = candidates.len(),
            provider_failures = state.provider_failures,
            timed_out,
            duration_ms,
            "Discovery finished"
        );

        Ok(DiscoveryReport {
            run_id,
            matches,
            candidates_scanned: candidates.len(),
            strategies_run: state.strategies_run,
            provider_failures: state.provider_failures,
            timed_out,
            duration_ms,
        })
    }

    async fn scan(&self, root: PathBuf, token: &CancellationToken) -> Vec<DirectoryCandidate> {
        let scanner = self.scanner.clone();
        let scan_token = token.clone();
        let mut handle = tokio::task::spawn_blocking(move || scanner.scan(&root, &scan_token));
        tokio::select! {
            biased;
            joined = &mut handle => joined.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Candidate scan task failed");
                Vec::new()
            }),
            () = token.cancelled() => {
                tracing::warn!("Deadline reached during candidate scan");
                Vec::new()
            },
        }
    }

    /// Runs one strategy over the outstanding candidates.
    #[instrument(level = "debug", skip_all, fields(strategy = %strategy, outstanding = outstanding.len()))]
    async fn run_strategy(
        &self,
        strategy: StrategyKind,
        candidates: &Arc<Vec<DirectoryCandidate>>,
        outstanding: &[usize],
        token: &CancellationToken,
        scorer: &ConfidenceScorer,
        state: &mut RunState,
    ) {
        let Some(provider) = self.registry.get(strategy) else {
            return;
        };
        let caller = ResilientCaller::new(strategy, self.config.provider_timeout, self.config.retry.clone());

        let absent = if strategy.query_mode() == QueryMode::Identifier && provider.supports_batch() {
            self.batch_precheck(strategy, &provider, &caller, candidates, outstanding, token, state)
                .await
        } else {
            HashSet::new()
        };

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit));
        let mut tasks = JoinSet::new();
        for &idx in outstanding {
            if absent.contains(&idx) {
                continue;
            }
            let Some(query) = Query::for_candidate(strategy, &candidates[idx]) else {
                continue;
            };
            let provider = Arc::clone(&provider);
            let cache = Arc::clone(&self.cache);
            let caller = caller.clone();
            let token = token.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (idx, Ok(Vec::new()));
                };
                if token.is_cancelled() {
                    return (idx, Err(ProviderError::Timeout));
                }
                (idx, lookup(strategy, query, provider, cache, caller, token).await)
            });
        }

        let mut gathered: Vec<(usize, Vec<OriginCandidate>)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, Ok(origins))) => gathered.push((idx, origins)),
                Ok((idx, Err(e))) => {
                    state.provider_failures += 1;
                    tracing::debug!(
                        strategy = %strategy,
                        candidate = %candidates[idx].path().display(),
                        error = %e,
                        "Provider call degraded to empty result"
                    );
                },
                Err(e) => {
                    state.provider_failures += 1;
                    tracing::warn!(strategy = %strategy, error = %e, "Provider task failed");
                },
            }
        }
        // Completion order is arbitrary; classify in candidate order.
        gathered.sort_by_key(|(idx, _)| *idx);

        for (idx, origins) in gathered {
            for origin in origins {
                if let Some(finding) = self.classify(strategy, idx, &candidates[idx], origin, token, state).await {
                    if self.config.early_termination
                        && finding.match_type == MatchType::Exact
                        && ranking::provisional_score(&finding, scorer) >= self.config.confidence_threshold
                    {
                        state.resolved.insert(idx);
                    }
                    state.findings.push(finding);
                }
            }
        }
    }

    /// Asks the provider which identifiers it knows, in `batch_size` chunks.
    ///
    /// Returns the candidates reported absent; their empty result is cached.
    /// A failed batch leaves its candidates to individual searches.
    #[allow(clippy::too_many_arguments)]
    async fn batch_precheck(
        &self,
        strategy: StrategyKind,
        provider: &Arc<dyn ProviderClient>,
        caller: &ResilientCaller,
        candidates: &[DirectoryCandidate],
        outstanding: &[usize],
        token: &CancellationToken,
        state: &mut RunState,
    ) -> HashSet<usize> {
        let pending: Vec<(usize, ContentIdentifier)> = outstanding
            .iter()
            .map(|&idx| (idx, *candidates[idx].identifier()))
            .filter(|(_, id)| {
                self.cache
                    .get(&CacheKey::for_identifier(strategy, id))
                    .is_none()
            })
            .collect();

        let mut absent = HashSet::new();
        for chunk in pending.chunks(self.config.batch_size) {
            if token.is_cancelled() {
                break;
            }
            let ids: Vec<ContentIdentifier> = chunk.iter().map(|(_, id)| *id).collect();
            let result = caller
                .call(token, || {
                    let provider = Arc::clone(provider);
                    let ids = ids.clone();
                    async move { provider.batch_check(&ids).await }
                })
                .await;
            match result {
                Ok(known) => {
                    for (idx, id) in chunk {
                        if known.get(id) == Some(&false) {
                            absent.insert(*idx);
                            self.cache
                                .put(CacheKey::for_identifier(strategy, id), Vec::new());
                        }
                    }
                },
                Err(e) => {
                    state.provider_failures += 1;
                    tracing::debug!(
                        strategy = %strategy,
                        batch = ids.len(),
                        error = %e,
                        "Batch check failed, falling back to individual searches"
                    );
                },
            }
        }
        tracing::debug!(strategy = %strategy, checked = pending.len(), absent = absent.len(), "Batch pre-check done");
        absent
    }

    /// Turns one provider result into a finding, or drops it.
    async fn classify(
        &self,
        strategy: StrategyKind,
        idx: usize,
        candidate: &DirectoryCandidate,
        origin: OriginCandidate,
        token: &CancellationToken,
        state: &mut RunState,
    ) -> Option<Finding> {
        if origin.matched_identifier.as_ref() == Some(candidate.identifier()) {
            return Some(Finding {
                candidate: idx,
                strategy,
                match_type: MatchType::Exact,
                similarity: 1.0,
                origin,
            });
        }
        if !self.matcher.config().enabled {
            return None;
        }
        let Some(reference) = origin.reference.as_ref() else {
            tracing::debug!(
                strategy = %strategy,
                origin_url = %origin.origin_url,
                "Result without reference tree dropped"
            );
            return None;
        };
        if token.is_cancelled() {
            tracing::debug!(
                strategy = %strategy,
                origin_url = %origin.origin_url,
                "Deadline reached, fuzzy comparison skipped"
            );
            return None;
        }

        let local = self.candidate_manifest(idx, candidate, token, state).await?;
        let matched = self.matcher.accept(&local, reference)?;
        let match_type = if matched.is_exact_equivalent() {
            MatchType::Exact
        } else {
            MatchType::Fuzzy
        };
        tracing::debug!(
            strategy = %strategy,
            origin_url = %origin.origin_url,
            similarity = matched.similarity,
            file_set = matched.tiers.file_set,
            "Fuzzy match accepted"
        );
        Some(Finding {
            candidate: idx,
            strategy,
            match_type,
            similarity: matched.similarity,
            origin,
        })
    }

    /// Manifest of a candidate, computed once per run.
    ///
    /// Hashing is abandoned, and nothing cached, once `token` is cancelled.
    async fn candidate_manifest(
        &self,
        idx: usize,
        candidate: &DirectoryCandidate,
        token: &CancellationToken,
        state: &mut RunState,
    ) -> Option<Arc<DirectoryManifest>> {
        if let Some(cached) = state.manifests.get(&idx) {
            return cached.clone();
        }
        let addresser = self.addresser.clone();
        let path = candidate.path().to_path_buf();
        let mut handle = tokio::task::spawn_blocking(move || addresser.manifest(&path));
        let joined = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(candidate = %candidate.path().display(), "Deadline reached during manifest hashing");
                return None;
            },
            joined = &mut handle => joined,
        };
        let manifest = match joined {
            Ok(Ok(manifest)) => Some(Arc::new(manifest)),
            Ok(Err(e)) => {
                tracing::debug!(candidate = %candidate.path().display(), error = %e, "Manifest unavailable");
                None
            },
            Err(e) => {
                tracing::warn!(error = %e, "Manifest task failed");
                None
            },
        };
        state.manifests.insert(idx, manifest.clone());
        manifest
    }

    /// Scores, dedupes, ranks, filters and enriches.
    fn finish(
        &self,
        findings: &[Finding],
        candidates: &[DirectoryCandidate],
        scorer: &ConfidenceScorer,
    ) -> Vec<MatchRecord> {
        let mut scored = ranking::dedupe(ranking::score_findings(findings, candidates, scorer));
        ranking::rank(&mut scored);
        scored
            .into_iter()
            .filter(|s| s.record.confidence >= self.config.confidence_threshold)
            .take(self.config.max_results)
            .map(|s| self.enrich(s))
            .collect()
    }

    fn enrich(&self, scored: Scored) -> MatchRecord {
        let Scored {
            mut record,
            metadata,
            source_url,
        } = scored;
        record.coordinates = self
            .extractor
            .extract(&record.origin_url, &metadata)
            .unwrap_or_default();
        record.purl = self
            .purl
            .generate(&source_url, &record.coordinates, record.confidence);
        record
    }
}

/// Cache-first provider lookup; only successful results are cached.
async fn lookup(
    strategy: StrategyKind,
    query: Query,
    provider: Arc<dyn ProviderClient>,
    cache: Arc<ResultCache>,
    caller: ResilientCaller,
    token: CancellationToken,
) -> ProviderResult<Vec<OriginCandidate>> {
    let key = query.cache_key(strategy);
    if let Some(hit) = cache.get(&key) {
        return Ok(hit);
    }

    let origins = caller
        .call(&token, || {
            let provider = Arc::clone(&provider);
            let query = query.clone();
            async move {
                match query {
                    Query::Identifier(id) => provider.search_by_content_identifier(&id).await,
                    Query::Keyword(text) => provider.search_by_keyword(&text).await,
                }
            }
        })
        .await?;
    cache.put(key, origins.clone());
    Ok(origins)
}

fn resolve_root(root: &Path) -> Result<PathBuf> {
    let meta = std::fs::metadata(root).map_err(|e| {
        Error::Configuration(format!("scan root '{}' is not accessible: {e}", root.display()))
    })?;
    if !meta.is_dir() {
        return Err(Error::Configuration(format!(
            "scan root '{}' is not a directory",
            root.display()
        )));
    }
    root.canonicalize().map_err(|e| {
        Error::Configuration(format!("scan root '{}' cannot be resolved: {e}", root.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FuzzyConfig;
    use crate::providers::StaticProvider;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn source_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, body) in [
            ("adler32.c", "int adler;"),
            ("crc32.c", "int crc;"),
            ("deflate.c", "int deflate;"),
            ("zlib.h", "#define ZLIB"),
        ] {
            fs::write(dir.path().join(name), body).unwrap();
        }
        dir
    }

    fn config(strategies: Vec<StrategyKind>) -> DiscoveryConfig {
        DiscoveryConfig::default()
            .with_strategies(strategies)
            .with_max_depth(0)
            .with_total_timeout(Duration::from_secs(5))
            .with_provider_timeout(Duration::from_secs(1))
    }

    fn cache() -> Arc<ResultCache> {
        Arc::new(ResultCache::new(std::num::NonZeroUsize::new(64).unwrap()))
    }

    fn root_id(dir: &TempDir) -> ContentIdentifier {
        ContentAddresser::new().identify(dir.path()).unwrap()
    }

    #[test]
    fn test_missing_provider_is_configuration_error() {
        let result = DiscoveryOrchestrator::new(
            config(vec![StrategyKind::Archive, StrategyKind::Fingerprint]),
            ProviderRegistry::new()
                .with_provider(StrategyKind::Archive, Arc::new(StaticProvider::new("a"))),
            cache(),
        );
        assert!(matches!(result, Err(Error::Configuration(msg)) if msg.contains("fingerprint")));
    }

    #[tokio::test]
    async fn test_missing_root_is_configuration_error() {
        let orchestrator = DiscoveryOrchestrator::new(
            config(vec![StrategyKind::Archive]),
            ProviderRegistry::new()
                .with_provider(StrategyKind::Archive, Arc::new(StaticProvider::new("a"))),
            cache(),
        )
        .unwrap();
        let result = orchestrator.discover(Path::new("/definitely/not/here")).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_exact_match_is_ranked_and_enriched() {
        let dir = source_tree();
        let provider = StaticProvider::new("archive").with_origin(
            root_id(&dir),
            OriginCandidate::new("https://github.com/madler/zlib.git", "archive")
                .with_identifier(root_id(&dir))
                .with_metadata("version", "v1.3.1"),
        );
        let orchestrator = DiscoveryOrchestrator::new(
            config(vec![StrategyKind::Archive]),
            ProviderRegistry::new().with_provider(StrategyKind::Archive, Arc::new(provider)),
            cache(),
        )
        .unwrap();

        let report = orchestrator.discover(dir.path()).await.unwrap();
        let best = report.best().unwrap();
        assert_eq!(best.origin_url, "https://github.com/madler/zlib");
        assert_eq!(best.match_type, MatchType::Exact);
        assert!(best.is_official_org);
        // 0.9 * 1.15 clamps to 1.0
        assert!((best.confidence - 1.0).abs() < 1e-9);
        assert_eq!(best.purl.as_deref(), Some("pkg:github/madler/zlib@1.3.1"));
        assert!(!report.timed_out);
        assert_eq!(report.candidates_scanned, 1);
    }

    #[tokio::test]
    async fn test_fuzzy_reference_is_scored() {
        let dir = source_tree();
        let mut reference = ContentAddresser::new().manifest(dir.path()).unwrap();
        reference.files.insert(
            "inflate.c".to_string(),
            ContentAddresser::hash_blob(b"int inflate;"),
        );
        reference.root = ContentAddresser::hash_blob(b"other root");

        let provider = StaticProvider::new("archive").with_origin(
            root_id(&dir),
            OriginCandidate::new("https://example.org/zlib", "archive")
                .with_identifier(reference.root)
                .with_reference(reference),
        );
        let orchestrator = DiscoveryOrchestrator::new(
            config(vec![StrategyKind::Archive])
                .with_confidence_threshold(0.3)
                .with_fuzzy(FuzzyConfig::default()),
            ProviderRegistry::new().with_provider(StrategyKind::Archive, Arc::new(provider)),
            cache(),
        )
        .unwrap();

        let report = orchestrator.discover(dir.path()).await.unwrap();
        let best = report.best().unwrap();
        assert_eq!(best.match_type, MatchType::Fuzzy);
        assert!(best.similarity > 0.5 && best.similarity < 1.0);
        assert!((best.confidence - best.similarity * 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_purl_uses_url_as_reported() {
        let dir = source_tree();
        let provider = StaticProvider::new("archive").with_origin(
            root_id(&dir),
            OriginCandidate::new("https://github.com/madler/zlib/issues/1", "archive")
                .with_identifier(root_id(&dir))
                .with_metadata("version", "v1.3.1"),
        );
        let orchestrator = DiscoveryOrchestrator::new(
            config(vec![StrategyKind::Archive]),
            ProviderRegistry::new().with_provider(StrategyKind::Archive, Arc::new(provider)),
            cache(),
        )
        .unwrap();

        let report = orchestrator.discover(dir.path()).await.unwrap();
        let best = report.best().unwrap();
        assert_eq!(best.origin_url, "https://github.com/madler/zlib");
        assert_eq!(best.coordinates.name.as_deref(), Some("zlib"));
        assert!(best.purl.is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_degrades() {
        let dir = source_tree();
        let broken = StaticProvider::new("broken")
            .with_failure(ProviderError::TransportError("connection refused".into()));
        let orchestrator = DiscoveryOrchestrator::new(
            config(vec![StrategyKind::Archive]),
            ProviderRegistry::new().with_provider(StrategyKind::Archive, Arc::new(broken)),
            cache(),
        )
        .unwrap();

        let report = orchestrator.discover(dir.path()).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(report.provider_failures, 1);
    }

    #[tokio::test]
    async fn test_deadline_timer_cancels_token() {
        let token = CancellationToken::new();
        let _timer = DeadlineTimer::start(token.clone(), Duration::from_millis(20));
        tokio::time::timeout(Duration::from_secs(2), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_deadline_timer_never_cancels() {
        let token = CancellationToken::new();
        drop(DeadlineTimer::start(token.clone(), Duration::from_millis(20)));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!token.is_cancelled());
    }
}
