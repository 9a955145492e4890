use super::{SharedPropertyStore, StorageResult};

/// Property access by `/`-separated path, e.g. `llm/usage/openai/gpt-4o/`
#[derive(Clone)]
pub struct HierarchicalStorage {
    store: SharedPropertyStore,
}

impl HierarchicalStorage {
    pub fn new(store: SharedPropertyStore) -> Self {
        Self { store }
    }

    pub fn get_value(&self, path: &str) -> Option<String> {
        self.store
            .get(&Self::path_to_key(path))
            .filter(|v| !v.is_empty())
    }

    pub fn set_value(&self, path: &str, value: &str) -> StorageResult<()> {
        self.store.set(&Self::path_to_key(path), value)
    }

    pub fn delete_value(&self, path: &str) -> StorageResult<()> {
        self.store.delete(&Self::path_to_key(path))
    }

    pub fn clear_all_values(&self) -> StorageResult<()> {
        self.store.delete_all()
    }

    /// Flat key: every `/` becomes `_`
    pub fn path_to_key(path: &str) -> String {
        path.replace('/', "_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryPropertyStore, PropertyStore};
    use std::sync::Arc;

    #[test]
    fn should_flatten_paths() {
        assert_eq!(
            HierarchicalStorage::path_to_key("llm/usage/openai/gpt-4o/"),
            "llm_usage_openai_gpt-4o_"
        );
    }

    #[test]
    fn should_store_under_flattened_key() {
        let store = Arc::new(MemoryPropertyStore::new());
        let storage = HierarchicalStorage::new(store.clone());

        storage.set_value("a/b/c", "1").unwrap();

        assert_eq!(store.get("a_b_c").as_deref(), Some("1"));
        assert_eq!(storage.get_value("a/b/c").as_deref(), Some("1"));

        storage.delete_value("a/b/c").unwrap();
        assert_eq!(storage.get_value("a/b/c"), None);
    }
}
