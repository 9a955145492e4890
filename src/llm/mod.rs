//! Chat-completion providers
//!
//! [`LlmProvider`] is the seam; [`OpenAiProvider`] talks to the OpenAI REST API through
//! the retrying [`ApiClient`](crate::api::ApiClient).

pub mod openai;
pub mod provider;
pub mod tool;
pub mod types;

pub use openai::{default_chat_models, OpenAiProvider, DEFAULT_MODEL};
pub use provider::{ChatRequest, LlmProvider, ProviderFactory, SharedProvider};
pub use tool::{SharedTool, Tool};
pub use types::{
    ContentPart, FunctionCall, ImageUrl, LlmCompletion, LlmMessage, LlmProviderKind,
    LlmRequestMetadata, LlmUsage, MessageContent, Role, ToolCall,
};
