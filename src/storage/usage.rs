use tracing::{debug, warn};

use super::{HierarchicalStorage, StorageResult};
use crate::llm::{LlmRequestMetadata, LlmUsage};

const BASE_PATH: &str = "llm/usage";

/// Cumulative token counters per provider and model, kept in document storage
#[derive(Clone)]
pub struct LlmUsageService {
    storage: HierarchicalStorage,
}

impl LlmUsageService {
    pub fn new(storage: HierarchicalStorage) -> Self {
        Self { storage }
    }

    fn path(metadata: &LlmRequestMetadata) -> String {
        format!(
            "{}/{}/{}/",
            BASE_PATH,
            metadata.model_provider.as_str(),
            metadata.model_name
        )
    }

    /// Adds `usage` to the stored counters; `None` is a no-op
    pub fn store_usage(
        &self,
        metadata: &LlmRequestMetadata,
        usage: Option<&LlmUsage>,
    ) -> StorageResult<()> {
        let Some(usage) = usage else {
            return Ok(());
        };

        let mut total = self.get_usage(metadata);
        total += *usage;
        self.storage
            .set_value(&Self::path(metadata), &serde_json::to_string(&total)?)?;

        debug!(
            model = %metadata.model_name,
            total_tokens = total.total_tokens,
            "Usage updated"
        );
        Ok(())
    }

    /// Stored counters, zero when nothing (or nothing readable) is stored
    pub fn get_usage(&self, metadata: &LlmRequestMetadata) -> LlmUsage {
        let path = Self::path(metadata);
        match self.storage.get_value(&path) {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(error = %e, path = %path, "Corrupt usage entry, resetting");
                LlmUsage::default()
            }),
            None => LlmUsage::default(),
        }
    }
}
