//! Key-value stores standing in for the host's property and cache services
//!
//! Two traits, [`PropertyStore`] (persistent settings) and [`CacheStore`] (values with a
//! time-to-live), each with an in-memory and a JSON-file implementation. The typed
//! services on top ([`SecretService`], [`HierarchicalStorage`], [`LlmUsageService`]) only
//! see the traits.

pub mod file;
pub mod hierarchical;
pub mod memory;
pub mod secrets;
pub mod usage;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use file::{FileCache, FilePropertyStore};
pub use hierarchical::HierarchicalStorage;
pub use memory::{MemoryCache, MemoryPropertyStore};
pub use secrets::{SecretKey, SecretService};
pub use usage::LlmUsageService;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persistent string settings, scoped to one user or one document
pub trait PropertyStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn delete(&self, key: &str) -> StorageResult<()>;
    fn delete_all(&self) -> StorageResult<()>;
}

/// String values that expire after a time-to-live
pub trait CacheStore: Send + Sync {
    /// Returns `None` for missing or expired entries
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Stores `value` only if no live entry exists, returning whether it was stored.
    ///
    /// The default is a plain get-then-put and is NOT atomic: two callers can both see
    /// the key as absent. Implementations that can check and write under one lock
    /// override it.
    fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<bool> {
        if self.get(key).is_some() {
            return Ok(false);
        }
        self.put(key, value, ttl)?;
        Ok(true)
    }
}

pub type SharedPropertyStore = Arc<dyn PropertyStore>;
pub type SharedCache = Arc<dyn CacheStore>;
