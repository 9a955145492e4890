use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::provider::{ChatRequest, LlmProvider};
use super::tool::{tool_definition, SharedTool};
use super::types::{
    LlmCompletion, LlmMessage, LlmProviderKind, LlmRequestMetadata, LlmUsage, ToolCall,
};
use crate::api::{ApiClient, Headers, RequestBody, SharedTransport};
use crate::utils::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";
pub const DEFAULT_MAX_TOKENS: u32 = 200;

const CHAT_COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";
const MODELS_ENDPOINT: &str = "/v1/models";

/// Fallback when the model list cannot be fetched
pub fn default_chat_models() -> Vec<String> {
    [
        "gpt-4.1-nano",
        "gpt-4.1-preview",
        "gpt-4.1",
        "gpt-4o",
        "gpt-4o-mini",
        "gpt-4",
        "gpt-3.5-turbo",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn is_chat_model(id: &str) -> bool {
    id.starts_with("gpt-")
        && !id.contains("instruct")
        && !id.contains("vision")
        && !id.contains("embedding")
}

#[derive(Debug, Serialize)]
struct ChatCompletionPayload<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// [`LlmProvider`] for the OpenAI chat-completions API
#[derive(Clone)]
pub struct OpenAiProvider {
    client: ApiClient,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: &str,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        transport: SharedTransport,
    ) -> Self {
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", api_key));
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self::with_client(ApiClient::new(base_url, headers, transport), default_model)
    }

    pub fn with_client(client: ApiClient, default_model: impl Into<String>) -> Self {
        Self {
            client,
            default_model: default_model.into(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.client.set_max_retries(max_retries);
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn metadata(model: &str) -> LlmRequestMetadata {
        LlmRequestMetadata {
            model_name: model.to_string(),
            model_endpoint: CHAT_COMPLETIONS_ENDPOINT.to_string(),
            model_provider: LlmProviderKind::OpenAi,
        }
    }

    async fn post_completion(
        &self,
        model: &str,
        messages: &[LlmMessage],
        max_tokens: u32,
        tools: &[SharedTool],
    ) -> Result<ChatCompletionResponse, AppError> {
        let payload = ChatCompletionPayload {
            model,
            messages,
            max_tokens,
            tools: (!tools.is_empty())
                .then(|| tools.iter().map(|t| tool_definition(t.as_ref())).collect()),
        };
        let body = RequestBody::Json(serde_json::to_value(&payload)?);

        let response = self
            .client
            .post(CHAT_COMPLETIONS_ENDPOINT, &body, None)
            .await?;
        let completion: ChatCompletionResponse = response.json()?;

        if completion.choices.is_empty() {
            return Err(AppError::invalid_response("completion has no choices"));
        }
        Ok(completion)
    }

    /// Runs every call in `tool_calls` that names one of `tools`.
    ///
    /// Returns one `tool` message per executed call, in call order.
    async fn run_tool_calls(
        tool_calls: &[ToolCall],
        tools: &[SharedTool],
    ) -> Result<Vec<LlmMessage>, AppError> {
        let mut results = Vec::new();
        for call in tool_calls.iter().filter(|c| c.kind == "function") {
            let Some(tool) = tools.iter().find(|t| t.name() == call.function.name) else {
                warn!(tool = %call.function.name, "Model called an unknown tool");
                continue;
            };

            let arguments: Value = serde_json::from_str(&call.function.arguments)
                .map_err(|e| AppError::ToolError(format!("{}: {}", tool.name(), e)))?;
            debug!(tool = tool.name(), call_id = %call.id, "Executing tool");

            let output = tool.execute(arguments).await?;
            results.push(LlmMessage::tool_result(
                call.id.clone(),
                serde_json::to_string(&output)?,
            ));
        }
        Ok(results)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<LlmCompletion, AppError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let mut messages = request.messages;

        let completion = self
            .post_completion(&model, &messages, max_tokens, &request.tools)
            .await?;
        let mut choices = completion.choices.into_iter();
        let Some(choice) = choices.next() else {
            return Err(AppError::invalid_response("completion has no choices"));
        };

        let wants_tools = choice.finish_reason.as_deref() == Some("tool_calls");
        let tool_calls = match &choice.message.tool_calls {
            Some(calls) if wants_tools && !request.tools.is_empty() => calls.clone(),
            _ => Vec::new(),
        };
        if !tool_calls.is_empty() {
            let results = Self::run_tool_calls(&tool_calls, &request.tools).await?;
            if !results.is_empty() {
                info!(model = %model, calls = results.len(), "Sending tool results");
                messages.push(
                    LlmMessage::assistant(choice.message.content.clone().unwrap_or_default())
                        .with_tool_calls(tool_calls),
                );
                messages.extend(results);

                let last = self
                    .post_completion(&model, &messages, max_tokens, &[])
                    .await?;
                let usage = completion.usage.unwrap_or_default() + last.usage.unwrap_or_default();
                let text = last
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default();

                return Ok(LlmCompletion {
                    text,
                    usage: Some(usage),
                    metadata: Self::metadata(&model),
                });
            }
        }

        Ok(LlmCompletion {
            text: choice.message.content.unwrap_or_default(),
            usage: completion.usage,
            metadata: Self::metadata(&model),
        })
    }

    async fn list_models(&self) -> Vec<String> {
        let response = match self.client.get(MODELS_ENDPOINT, None).await {
            Ok(r) if r.status == 200 => r,
            Ok(r) => {
                warn!(status = r.status, "Failed to fetch models");
                return default_chat_models();
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch models");
                return default_chat_models();
            }
        };

        let models: Vec<String> = match response.json::<ModelList>() {
            Ok(list) => list
                .data
                .into_iter()
                .map(|m| m.id)
                .filter(|id| is_chat_model(id))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Unreadable model list");
                Vec::new()
            }
        };

        if models.is_empty() {
            default_chat_models()
        } else {
            models
        }
    }
}
