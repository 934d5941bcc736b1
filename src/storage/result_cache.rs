//! In-memory TTL cache for provider results.

use super::{CacheBackend, CacheError, FilesystemCacheStore};
use crate::config::CacheConfig;
use crate::models::{ContentIdentifier, OriginCandidate};
use crate::providers::StrategyKind;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Composite cache key: strategy plus query payload.
///
/// The payload is `id:<content identifier>` for identifier strategies and
/// `kw:<lowercased text>` for keyword strategies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    strategy: StrategyKind,
    query: String,
}

impl CacheKey {
    /// Key for an identifier query.
    #[must_use]
    pub fn for_identifier(strategy: StrategyKind, id: &ContentIdentifier) -> Self {
        Self {
            strategy,
            query: format!("id:{id}"),
        }
    }

    /// Key for a keyword query.
    #[must_use]
    pub fn for_keyword(strategy: StrategyKind, text: &str) -> Self {
        Self {
            strategy,
            query: format!("kw:{}", text.trim().to_lowercase()),
        }
    }

    /// Strategy part of the key.
    #[must_use]
    pub const fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Query part of the key.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Hex SHA-256 of the key, used to address persisted entries.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.strategy.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.query.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.strategy, self.query)
    }
}

/// A cached provider result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Entry key.
    pub key: CacheKey,
    /// Cached origins (possibly empty).
    pub value: Vec<OriginCandidate>,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
    /// Lifetime from `stored_at`.
    pub ttl: Duration,
}

impl CacheEntry {
    /// Returns true once `now - stored_at >= ttl`.
    ///
    /// A `stored_at` in the future (clock skew) counts as fresh.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        (now - self.stored_at)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= self.ttl)
    }
}

/// TTL-keyed store for provider results.
///
/// # Semantics
///
/// - `get` returns a value only while it is unexpired; expired entries are
///   evicted on the read that notices them
/// - `put` unconditionally overwrites
/// - TTL is chosen per strategy at write time
///
/// # Thread Safety
///
/// All state sits behind one `Mutex`; each operation holds it for a single
/// map access, so concurrent workers never observe a torn entry. A poisoned
/// lock degrades to cache misses.
///
/// # Example
///
/// ```rust
/// use srcorigin::models::{ContentIdentifier, ObjectKind};
/// use srcorigin::providers::StrategyKind;
/// use srcorigin::storage::{CacheKey, ResultCache};
/// use std::num::NonZeroUsize;
///
/// let cache = ResultCache::new(NonZeroUsize::new(16).unwrap());
/// let id = ContentIdentifier::new(ObjectKind::Tree, [1; 32]);
/// let key = CacheKey::for_identifier(StrategyKind::Archive, &id);
///
/// assert!(cache.get(&key).is_none());
/// cache.put(key.clone(), Vec::new());
/// assert_eq!(cache.get(&key), Some(Vec::new()));
/// ```
pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl_overrides: HashMap<StrategyKind, Duration>,
    backend: Option<Arc<dyn CacheBackend>>,
    enabled: bool,
}

impl ResultCache {
    /// Creates an in-memory cache with strategy default TTLs.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl_overrides: HashMap::new(),
            backend: None,
            enabled: true,
        }
    }

    /// Creates a cache that stores nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(NonZeroUsize::MIN)
        }
    }

    /// Builds a cache from configuration, opening the on-disk store when a
    /// directory is configured.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the cache directory cannot be created.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        let mut cache = Self::new(capacity);
        cache.ttl_overrides.clone_from(&config.ttl_overrides);
        if let Some(dir) = &config.directory {
            cache.backend = Some(Arc::new(FilesystemCacheStore::open(dir)?));
        }
        Ok(cache)
    }

    /// Attaches a persistent backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Overrides the TTL for one strategy.
    #[must_use]
    pub fn with_ttl(mut self, strategy: StrategyKind, ttl: Duration) -> Self {
        self.ttl_overrides.insert(strategy, ttl);
        self
    }

    /// Returns true unless the cache was built disabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// TTL applied to entries written for `strategy`.
    #[must_use]
    pub fn ttl_for(&self, strategy: StrategyKind) -> Duration {
        self.ttl_overrides
            .get(&strategy)
            .copied()
            .unwrap_or_else(|| strategy.default_ttl())
    }

    /// Looks up a fresh value.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Vec<OriginCandidate>> {
        self.get_at(key, Utc::now())
    }

    /// Looks up a value as of `now`.
    #[must_use]
    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Vec<OriginCandidate>> {
        if !self.enabled {
            return None;
        }

        let memory = self.lookup_memory(key, now);
        let (value, outcome) = match memory {
            Lookup::Hit(value) => (Some(value), "hit"),
            Lookup::Expired => {
                self.remove_persisted(key);
                (None, "expired")
            },
            Lookup::Miss => match self.lookup_backend(key, now) {
                Some(value) => (Some(value), "hit"),
                None => (None, "miss"),
            },
        };

        metrics::counter!(
            "result_cache_lookups_total",
            "strategy" => key.strategy().as_str(),
            "outcome" => outcome
        )
        .increment(1);
        tracing::trace!(key = %key, outcome, "Result cache lookup");

        value
    }

    /// Stores a value, replacing any existing entry for the key.
    pub fn put(&self, key: CacheKey, value: Vec<OriginCandidate>) {
        self.put_at(key, value, Utc::now());
    }

    /// Stores a value as written at `now`.
    pub fn put_at(&self, key: CacheKey, value: Vec<OriginCandidate>, now: DateTime<Utc>) {
        if !self.enabled {
            return;
        }
        let entry = CacheEntry {
            ttl: self.ttl_for(key.strategy()),
            key,
            value,
            stored_at: now,
        };

        if let Some(backend) = &self.backend
            && let Err(e) = backend.store(&entry)
        {
            tracing::warn!(key = %entry.key, error = %e, "Failed to persist cache entry");
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(entry.key.clone(), entry);
        }
    }

    /// Removes one entry.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(key);
        }
        self.remove_persisted(key);
    }

    /// Removes every entry, including persisted ones.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        if let Some(backend) = &self.backend
            && let Err(e) = backend.clear()
        {
            tracing::warn!(error = %e, "Failed to clear persisted cache");
        }
    }

    /// Number of in-memory entries (expired ones included until read).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Returns true when no in-memory entries exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup_memory(&self, key: &CacheKey, now: DateTime<Utc>) -> Lookup {
        let Ok(mut entries) = self.entries.lock() else {
            return Lookup::Miss;
        };
        match entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => return Lookup::Hit(entry.value.clone()),
            Some(_) => {},
            None => return Lookup::Miss,
        }
        entries.pop(key);
        Lookup::Expired
    }

    fn lookup_backend(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Vec<OriginCandidate>> {
        let backend = self.backend.as_ref()?;
        let entry = match backend.load(key) {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Unreadable cache entry, treating as miss");
                return None;
            },
        };
        if entry.key != *key || entry.is_expired_at(now) {
            self.remove_persisted(key);
            return None;
        }
        let value = entry.value.clone();
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key.clone(), entry);
        }
        Some(value)
    }

    fn remove_persisted(&self, key: &CacheKey) {
        if let Some(backend) = &self.backend
            && let Err(e) = backend.remove(key)
        {
            tracing::debug!(key = %key, error = %e, "Failed to remove persisted cache entry");
        }
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.enabled)
            .field("len", &self.len())
            .field("persistent", &self.backend.is_some())
            .finish_non_exhaustive()
    }
}

enum Lookup {
    Hit(Vec<OriginCandidate>),
    Expired,
    Miss,
}
