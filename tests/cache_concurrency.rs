//! Concurrent access to the shared result cache.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use srcorigin::models::{ContentIdentifier, ObjectKind, OriginCandidate};
use srcorigin::providers::StrategyKind;
use srcorigin::storage::{CacheKey, FilesystemCacheStore, ResultCache};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::task::JoinSet;

fn id(n: u8) -> ContentIdentifier {
    ContentIdentifier::new(ObjectKind::Tree, [n; 32])
}

fn origin(n: u8) -> OriginCandidate {
    OriginCandidate::new(format!("https://example.org/project-{n}"), "archive").with_identifier(id(n))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_and_readers() {
    let cache = Arc::new(ResultCache::new(NonZeroUsize::new(256).unwrap()));
    let mut tasks = JoinSet::new();

    for n in 0..64u8 {
        let cache = Arc::clone(&cache);
        tasks.spawn(async move {
            let key = CacheKey::for_identifier(StrategyKind::Archive, &id(n));
            cache.put(key.clone(), vec![origin(n)]);
            tokio::task::yield_now().await;
            cache.get(&key)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let hit = joined.unwrap().unwrap();
        assert_eq!(hit.len(), 1);
    }
    assert_eq!(cache.len(), 64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_key_last_write_wins_without_tearing() {
    let cache = Arc::new(ResultCache::new(NonZeroUsize::new(8).unwrap()));
    let key = CacheKey::for_keyword(StrategyKind::KeywordSearch, "zlib");
    let mut tasks = JoinSet::new();

    for n in 0..32u8 {
        let cache = Arc::clone(&cache);
        let key = key.clone();
        tasks.spawn(async move {
            cache.put(key, vec![origin(n), origin(n)]);
        });
    }
    while tasks.join_next().await.is_some() {}

    let stored = cache.get(&key).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].origin_url, stored[1].origin_url);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_persistent_backend_survives_concurrent_puts() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FilesystemCacheStore::open(dir.path().join("cache")).unwrap());
    let cache = Arc::new(ResultCache::new(NonZeroUsize::new(64).unwrap()).with_backend(store.clone()));

    let mut tasks = JoinSet::new();
    for n in 0..16u8 {
        let cache = Arc::clone(&cache);
        tasks.spawn(async move {
            cache.put(CacheKey::for_identifier(StrategyKind::Archive, &id(n)), vec![origin(n)]);
        });
    }
    while tasks.join_next().await.is_some() {}

    // A fresh memory layer over the same directory sees every entry.
    let reopened = ResultCache::new(NonZeroUsize::new(64).unwrap()).with_backend(store);
    for n in 0..16u8 {
        let hit = reopened
            .get(&CacheKey::for_identifier(StrategyKind::Archive, &id(n)))
            .unwrap();
        assert_eq!(hit[0].origin_url, format!("https://example.org/project-{n}"));
    }
}
