use tracing::info;

use super::{SharedPropertyStore, StorageResult};

/// Secrets kept in the user's property store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKey {
    UserOpenAiKey,
}

impl SecretKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKey::UserOpenAiKey => "USER_OPENAI_KEY",
        }
    }
}

/// Per-user secret storage
#[derive(Clone)]
pub struct SecretService {
    store: SharedPropertyStore,
}

impl SecretService {
    pub fn new(store: SharedPropertyStore) -> Self {
        Self { store }
    }

    /// Empty values are treated as unset
    pub fn get_secret(&self, key: SecretKey) -> Option<String> {
        self.store.get(key.as_str()).filter(|v| !v.is_empty())
    }

    pub fn set_secret(&self, key: SecretKey, value: &str) -> StorageResult<()> {
        self.store.set(key.as_str(), value)?;
        info!(key = key.as_str(), "Secret stored");
        Ok(())
    }

    pub fn delete_secret(&self, key: SecretKey) -> StorageResult<()> {
        self.store.delete(key.as_str())
    }

    /// Removes every user property, secrets and settings alike
    pub fn clear_all_secrets(&self) -> StorageResult<()> {
        self.store.delete_all()
    }
}
