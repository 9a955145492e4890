//! `GPT` cell function over the OpenAI provider
//!
//! The chat-completions API is a wiremock server; stores are in memory.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sheets_ai::analytics::Analytics;
use sheets_ai::api::{ReqwestTransport, SharedTransport};
use sheets_ai::config::{AnalyticsSettings, FlushMode};
use sheets_ai::llm::{OpenAiProvider, ProviderFactory, SharedProvider};
use sheets_ai::sheets::{GptOptions, SheetFunctions};
use sheets_ai::storage::{
    HierarchicalStorage, LlmUsageService, MemoryCache, MemoryPropertyStore, PropertyStore,
    SecretService,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    functions: SheetFunctions,
    properties: Arc<MemoryPropertyStore>,
}

fn harness(server: &MockServer) -> Harness {
    let transport: SharedTransport = ReqwestTransport::shared();
    let properties = Arc::new(MemoryPropertyStore::new());
    let cache = Arc::new(MemoryCache::new());
    let analytics = Analytics::new(
        AnalyticsSettings {
            flush_mode: FlushMode::Background,
            flush_delay: Duration::from_secs(3600),
            ..AnalyticsSettings::default()
        },
        cache.clone(),
        properties.clone(),
        transport.clone(),
    );

    let base_url = server.uri();
    let providers: ProviderFactory = Arc::new(move |key: &str| -> SharedProvider {
        Arc::new(
            OpenAiProvider::new(key, base_url.clone(), "gpt-4.1-nano", transport.clone())
                .with_max_retries(1),
        )
    });

    let functions = SheetFunctions::new(
        SecretService::new(properties.clone()),
        LlmUsageService::new(HierarchicalStorage::new(properties.clone())),
        cache,
        analytics,
        providers,
        "gpt-4.1-nano",
    );
    Harness {
        functions,
        properties,
    }
}

#[tokio::test]
async fn gpt_should_call_api_once_and_cache_the_answer() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Paris"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server);
    h.functions.set_api_key("sk-user").await.unwrap();

    // Act
    let first = h.functions.gpt("Capital of France?", GptOptions::default()).await;
    let second = h.functions.gpt("Capital of France?", GptOptions::default()).await;

    // Assert
    assert_eq!(first, "Paris");
    assert_eq!(second, "Paris");
    assert_eq!(h.functions.usage(None).total_tokens, 13);
    assert!(h
        .properties
        .get("llm_usage_openai_gpt-4.1-nano_")
        .is_some());
}

#[tokio::test]
async fn gpt_should_turn_api_failure_into_cell_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server);
    h.functions.set_api_key("sk-user").await.unwrap();

    let text = h.functions.gpt("hello", GptOptions::default()).await;

    assert_eq!(
        text,
        "Error: the remote API did not respond after 1 attempts"
    );
    let events = h.functions.analytics().queue().events();
    assert_eq!(events.last().unwrap().event, "error");
}

#[tokio::test]
async fn gpt_should_not_call_api_without_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let h = harness(&server);

    let text = h.functions.gpt("hello", GptOptions::default()).await;

    assert_eq!(text, "please configure your OpenAI API key first");
}

#[tokio::test]
async fn models_should_be_filtered_from_api_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "gpt-4o"}, {"id": "gpt-4o-mini"}, {"id": "text-embedding-3-large"}]
        })))
        .mount(&server)
        .await;
    let h = harness(&server);
    h.functions.set_api_key("sk-user").await.unwrap();

    let models = h.functions.list_models().await;

    assert_eq!(models, vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]);
}
