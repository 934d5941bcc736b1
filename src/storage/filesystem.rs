//! Filesystem-backed cache persistence.
//!
//! Stores each entry as a JSON file: `{root}/{sha256(key)}.json`.

use super::{CacheBackend, CacheEntry, CacheError, CacheKey};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One JSON file per cache entry.
///
/// Writes go to a temporary sibling and are renamed into place, so readers
/// never see a half-written entry. Files that fail to decode are deleted.
#[derive(Debug, Clone)]
pub struct FilesystemCacheStore {
    root: PathBuf,
}

impl FilesystemCacheStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.json", key.digest()))
    }

    fn discard(path: &Path) {
        if let Err(e) = fs::remove_file(path)
            && e.kind() != ErrorKind::NotFound
        {
            tracing::debug!(path = %path.display(), error = %e, "Failed to discard cache file");
        }
    }
}

impl CacheBackend for FilesystemCacheStore {
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        match serde_json::from_slice::<CacheEntry>(&content) {
            Ok(entry) if entry.key == *key => Ok(Some(entry)),
            Ok(_) => {
                Self::discard(&path);
                Err(CacheError::Corrupt {
                    key: key.digest(),
                    cause: "key mismatch".to_string(),
                })
            },
            Err(e) => {
                Self::discard(&path);
                Err(CacheError::Corrupt {
                    key: key.digest(),
                    cause: e.to_string(),
                })
            },
        }
    }

    fn store(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.entry_path(&entry.key);
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", entry.key.digest(), uuid::Uuid::now_v7().simple()));
        let content = serde_json::to_vec(entry)?;

        fs::write(&tmp, content).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| {
            Self::discard(&tmp);
            CacheError::Io { path, source }
        })
    }

    fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    fn clear(&self) -> Result<(), CacheError> {
        let entries = fs::read_dir(&self.root).map_err(|source| CacheError::Io {
            path: self.root.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path).map_err(|source| CacheError::Io { path, source })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentIdentifier, ObjectKind, OriginCandidate};
    use crate::providers::StrategyKind;
    use chrono::Utc;
    use std::time::Duration;

    fn entry(byte: u8) -> CacheEntry {
        CacheEntry {
            key: CacheKey::for_identifier(
                StrategyKind::Fingerprint,
                &ContentIdentifier::new(ObjectKind::Tree, [byte; 32]),
            ),
            value: vec![OriginCandidate::new("https://github.com/madler/zlib", "fingerprint")],
            stored_at: Utc::now(),
            ttl: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemCacheStore::open(dir.path()).unwrap();
        let e = entry(1);

        store.store(&e).unwrap();
        let loaded = store.load(&e.key).unwrap().unwrap();
        assert_eq!(loaded, e);
        assert!(dir.path().join(format!("{}.json", e.key.digest())).exists());
    }

    #[test]
    fn test_rewrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemCacheStore::open(dir.path()).unwrap();
        let e = entry(6);

        store.store(&e).unwrap();
        store.store(&e).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|d| d.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", e.key.digest())]);
    }

    #[test]
    fn test_missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemCacheStore::open(dir.path()).unwrap();
        assert!(store.load(&entry(2).key).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_entry_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemCacheStore::open(dir.path()).unwrap();
        let e = entry(3);
        let path = dir.path().join(format!("{}.json", e.key.digest()));
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(store.load(&e.key), Err(CacheError::Corrupt { .. })));
        assert!(!path.exists());
        assert!(store.load(&e.key).unwrap().is_none());
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemCacheStore::open(dir.path()).unwrap();
        let (a, b) = (entry(4), entry(5));
        store.store(&a).unwrap();
        store.store(&b).unwrap();

        store.remove(&a.key).unwrap();
        store.remove(&a.key).unwrap();
        assert!(store.load(&a.key).unwrap().is_none());

        store.clear().unwrap();
        assert!(store.load(&b.key).unwrap().is_none());
    }
}
