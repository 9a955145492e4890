use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::tool::SharedTool;
use super::types::{LlmCompletion, LlmMessage};
use crate::utils::error::AppError;

/// One chat-completion call. Unset fields fall back to the provider defaults.
#[derive(Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<LlmMessage>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<SharedTool>,
}

impl ChatRequest {
    pub fn new(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tool(mut self, tool: SharedTool) -> Self {
        self.tools.push(tool);
        self
    }
}

impl fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tools: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("ChatRequest")
            .field("messages", &self.messages.len())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("tools", &tools)
            .finish()
    }
}

/// Chat-completion backend
///
/// Swapped for a mock in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_chat_completion(&self, request: ChatRequest)
        -> Result<LlmCompletion, AppError>;

    /// Chat models the account can use, or a fixed default list when they cannot be
    /// fetched
    async fn list_models(&self) -> Vec<String>;
}

pub type SharedProvider = Arc<dyn LlmProvider>;

/// Builds a provider for an API key
pub type ProviderFactory = Arc<dyn Fn(&str) -> SharedProvider + Send + Sync>;
