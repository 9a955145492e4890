use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::utils::error::AppError;

/// A function the model may call during a chat completion
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;
    async fn execute(&self, arguments: Value) -> Result<Value, AppError>;
}

pub type SharedTool = Arc<dyn Tool>;

/// Wire form of a tool in a chat-completion request
pub(crate) fn tool_definition(tool: &dyn Tool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": tool.description(),
            "parameters": tool.parameters(),
        }
    })
}
