//! Result cache storage.
//!
//! Two layers:
//! - **Memory**: [`ResultCache`], an LRU map with per-strategy TTL and lazy expiry
//! - **Persistence** (optional): a [`CacheBackend`], such as
//!   [`FilesystemCacheStore`], consulted on memory misses and written through
//!   on every put
//!
//! Cache failures never surface to a discovery run; a corrupt or unreadable
//! entry is a miss.

// Allow significant_drop_tightening - the guard scope is already minimal.
#![allow(clippy::significant_drop_tightening)]

mod filesystem;
mod result_cache;

pub use filesystem::FilesystemCacheStore;
pub use result_cache::{CacheEntry, CacheKey, ResultCache};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by cache persistence.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing an entry failed.
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An entry exists but cannot be decoded.
    #[error("corrupt cache entry {key}: {cause}")]
    Corrupt {
        /// Digest of the entry key.
        key: String,
        /// What was wrong.
        cause: String,
    },

    /// An entry could not be encoded.
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistent layer behind [`ResultCache`].
///
/// Implementations must tolerate concurrent calls for different keys.
pub trait CacheBackend: Send + Sync {
    /// Loads an entry, returning `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the entry exists but cannot be read.
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Stores an entry, replacing any previous one for the same key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the entry cannot be written.
    fn store(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Removes an entry; absent entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if removal fails.
    fn remove(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be enumerated or cleared.
    fn clear(&self) -> Result<(), CacheError>;
}
