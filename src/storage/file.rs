//! JSON-file stores
//!
//! Each store is one JSON document rewritten on every mutation. A missing file is an
//! empty store; an unreadable or corrupt file is logged and treated as empty.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CacheStore, PropertyStore, StorageError, StorageResult};

fn read_document<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Failed to read store file, using empty store");
            return T::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(error = %e, path = %path.display(), "Corrupt store file, using empty store");
        T::default()
    })
}

fn write_document<T: Serialize>(path: &Path, document: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content = serde_json::to_string_pretty(document)?;
    fs::write(path, content).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), "Store file written");
    Ok(())
}

/// [`PropertyStore`] persisted to a JSON object file
#[derive(Debug)]
pub struct FilePropertyStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FilePropertyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, mutate: F) -> StorageResult<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self.lock.lock();
        let mut values: HashMap<String, String> = read_document(&self.path);
        mutate(&mut values);
        write_document(&self.path, &values)
    }
}

impl PropertyStore for FilePropertyStore {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock();
        let mut values: HashMap<String, String> = read_document(&self.path);
        values.remove(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.update(|values| {
            values.remove(key);
        })
    }

    fn delete_all(&self) -> StorageResult<()> {
        self.update(|values| values.clear())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileCacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// [`CacheStore`] persisted to a JSON file, expiring on wall-clock time.
///
/// Survives process restarts; expired entries are pruned on every write.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn expiry(ttl: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn load_live(&self) -> HashMap<String, FileCacheEntry> {
        let now = Utc::now();
        let mut entries: HashMap<String, FileCacheEntry> = read_document(&self.path);
        entries.retain(|_, entry| entry.expires_at > now);
        entries
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock();
        self.load_live().remove(key).map(|entry| entry.value)
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load_live();
        entries.insert(
            key.to_string(),
            FileCacheEntry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl),
            },
        );
        write_document(&self.path, &entries)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load_live();
        entries.remove(key);
        write_document(&self.path, &entries)
    }

    fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<bool> {
        let _guard = self.lock.lock();
        let mut entries = self.load_live();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            FileCacheEntry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl),
            },
        );
        write_document(&self.path, &entries)?;
        Ok(true)
    }
}
