use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{CacheStore, PropertyStore, StorageResult};

/// Process-local [`PropertyStore`]
#[derive(Debug, Default)]
pub struct MemoryPropertyStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl PropertyStore for MemoryPropertyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn delete_all(&self) -> StorageResult<()> {
        self.values.lock().clear();
        Ok(())
    }
}

const FAR_FUTURE_SECS: u64 = 86400 * 365 * 30;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local [`CacheStore`]. Expiry follows the tokio clock, so paused-time tests
/// can advance it.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `now + ttl`, clamped to roughly thirty years ahead
    fn expiry(ttl: Duration) -> Instant {
        let now = Instant::now();
        now.checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
    }

    fn live_value(entries: &mut HashMap<String, CacheEntry>, key: &str) -> Option<String> {
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        Self::live_value(&mut entries, key)
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        self.entries.lock().insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<bool> {
        let mut entries = self.entries.lock();
        if Self::live_value(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(true)
    }
}
