use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::analytics::{events, Analytics};
use crate::llm::openai::DEFAULT_MAX_TOKENS;
use crate::llm::{
    default_chat_models, ChatRequest, LlmMessage, LlmProviderKind, LlmRequestMetadata, LlmUsage,
    ProviderFactory,
};
use crate::storage::{LlmUsageService, SecretKey, SecretService, SharedCache};
use crate::utils::error::AppError;
use crate::utils::hash_string;

/// How long a completion is served from the result cache
pub const RESULT_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

const GPT_FUNCTION: &str = "GPT";
const OPENAI_KEY_NAME: &str = "OpenAI API key";

/// Per-call overrides for [`SheetFunctions::gpt`]
#[derive(Debug, Clone, Default)]
pub struct GptOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Backing for the spreadsheet custom functions and settings actions
pub struct SheetFunctions {
    secrets: SecretService,
    usage: LlmUsageService,
    cache: SharedCache,
    analytics: Analytics,
    providers: ProviderFactory,
    fallback_key: Option<String>,
    default_model: String,
}

impl SheetFunctions {
    pub fn new(
        secrets: SecretService,
        usage: LlmUsageService,
        cache: SharedCache,
        analytics: Analytics,
        providers: ProviderFactory,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            usage,
            cache,
            analytics,
            providers,
            fallback_key: None,
            default_model: default_model.into(),
        }
    }

    /// Key used when the user has not stored one
    pub fn with_fallback_key(mut self, key: Option<String>) -> Self {
        self.fallback_key = key;
        self
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    fn api_key(&self) -> Option<String> {
        self.secrets
            .get_secret(SecretKey::UserOpenAiKey)
            .or_else(|| self.fallback_key.clone())
    }

    /// `=GPT(prompt)`. Always returns the text to put in the cell.
    ///
    /// Failures come back as `Error: <message>`; a missing key asks the user to
    /// configure one.
    pub async fn gpt(&self, prompt: &str, options: GptOptions) -> String {
        let started = Instant::now();
        let model = options
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.default_model.clone());
        let max_tokens = options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);

        match self.complete(prompt, &model, max_tokens).await {
            Ok((text, cached)) => {
                let mut properties = Map::new();
                properties.insert("function".to_string(), json!(GPT_FUNCTION));
                properties.insert("model".to_string(), json!(model));
                properties.insert("cached".to_string(), json!(cached));
                properties.insert(
                    "duration_ms".to_string(),
                    json!(started.elapsed().as_millis() as u64),
                );
                self.analytics.track(events::FUNCTION_CALL, properties).await;
                text
            }
            Err(AppError::MissingCredential(name)) => {
                warn!(function = GPT_FUNCTION, "API key not configured");
                AppError::MissingCredential(name).message()
            }
            Err(e) => {
                let e = e.logged();
                let mut properties = error_properties(GPT_FUNCTION, &e);
                properties.insert("model".to_string(), json!(model));
                self.analytics.track(events::ERROR, properties).await;
                format!("Error: {}", e.message())
            }
        }
    }

    /// Returns the completion text and whether it came from the result cache
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
    ) -> Result<(String, bool), AppError> {
        if prompt.trim().is_empty() {
            return Err(AppError::validation_error("prompt is empty"));
        }
        let api_key = self
            .api_key()
            .ok_or_else(|| AppError::missing_credential(OPENAI_KEY_NAME))?;

        let cache_key = hash_string(&format!("{}{}{}", model, max_tokens, prompt));
        if let Some(text) = self.cache.get(&cache_key) {
            info!(model, "Serving cached completion");
            return Ok((text, true));
        }

        let provider = (self.providers)(&api_key);
        let request = ChatRequest::new(vec![LlmMessage::user(prompt)])
            .with_model(model)
            .with_max_tokens(max_tokens);
        let completion = provider.generate_chat_completion(request).await?;

        if let Err(e) = self
            .usage
            .store_usage(&completion.metadata, completion.usage.as_ref())
        {
            error!(error = %e, "Failed to store usage");
        }
        if let Err(e) = self.cache.put(&cache_key, &completion.text, RESULT_CACHE_TTL) {
            warn!(error = %e, "Failed to cache completion");
        }

        Ok((completion.text, false))
    }

    /// Stores the user's OpenAI key
    pub async fn set_api_key(&self, key: &str) -> Result<(), AppError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::validation_error("API key is empty"));
        }
        self.secrets.set_secret(SecretKey::UserOpenAiKey, key)?;
        self.analytics.track(events::API_KEY_SET, Map::new()).await;
        Ok(())
    }

    pub fn clear_api_key(&self) -> Result<(), AppError> {
        self.secrets.delete_secret(SecretKey::UserOpenAiKey)?;
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Stored token counters for an OpenAI model
    pub fn usage(&self, model: Option<&str>) -> LlmUsage {
        let metadata = LlmRequestMetadata {
            model_name: model.unwrap_or(self.default_model.as_str()).to_string(),
            model_endpoint: "/v1/chat/completions".to_string(),
            model_provider: LlmProviderKind::OpenAi,
        };
        self.usage.get_usage(&metadata)
    }

    /// Chat models for the settings picker
    pub async fn list_models(&self) -> Vec<String> {
        match self.api_key() {
            Some(key) => (self.providers)(&key).list_models().await,
            None => default_chat_models(),
        }
    }

    /// Deletes every user property: the key, the analytics id and the opt-out choice
    pub fn reset_all_settings(&self) -> Result<(), AppError> {
        self.secrets.clear_all_secrets()?;
        info!("All user settings removed");
        Ok(())
    }
}

/// Properties of an `error` event
pub fn error_properties(function: &str, error: &AppError) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("function".to_string(), json!(function));
    properties.insert("code".to_string(), json!(error.error_code()));
    properties
}
