//! Wire-level adapter tests against wiremock servers.
//!
//! Request/response shapes follow the vendors' public API references.

use std::time::Duration;

use omega_air::{
    AirConfig, AirError, ClaudeAdapter, GenerationRequest, MistralAdapter, OpenAIAdapter,
    ProviderAdapter, ProviderConfig, ProviderId, Router, TokenUsage,
};
use omega_air::providers::AdapterTable;
use omega_air::registry::ModelRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_completion_response(model: &str) -> Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello! How can I help you today?"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
    })
}

fn messages_response() -> Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "model": "claude-3-haiku-20240307",
        "content": [{"type": "text", "text": "Bonjour"}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 14, "output_tokens": 4}
    })
}

async fn sent_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap_or_default();
    let last = requests.last().expect("no request received");
    serde_json::from_slice(&last.body).unwrap()
}

#[tokio::test]
async fn test_openai_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(header("Content-Type", "application/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_completion_response("gpt-4o-2024-08-06")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::OpenAI, Some("test-api-key"))
        .with_base_url(server.uri());
    let adapter = OpenAIAdapter::from_config(&config).unwrap();
    let response = adapter
        .generate(&GenerationRequest::new("Hello").with_model("gpt-4o").with_temperature(0.2))
        .await
        .unwrap();

    assert_eq!(response.provider, ProviderId::OpenAI);
    assert_eq!(response.model, "gpt-4o-2024-08-06");
    assert_eq!(response.content, "Hello! How can I help you today?");
    assert_eq!(response.usage, TokenUsage::new(9, 12));

    let body = sent_body(&server).await;
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["max_tokens"], 1000);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn test_openai_system_prompt_is_first_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_completion_response("gpt-4o-mini")),
        )
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::OpenAI, Some("k")).with_base_url(server.uri());
    OpenAIAdapter::from_config(&config)
        .unwrap()
        .generate(&GenerationRequest::new("Hello").with_system_prompt("You write ad copy."))
        .await
        .unwrap();

    let body = sent_body(&server).await;
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "You write ad copy.");
    assert_eq!(body["messages"][1]["role"], "user");
}

#[tokio::test]
async fn test_openai_error_status_is_request_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "message": "Rate limit reached for requests",
                "type": "requests",
                "param": null,
                "code": "rate_limit_exceeded"
            }
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::OpenAI, Some("k")).with_base_url(server.uri());
    let err = OpenAIAdapter::from_config(&config)
        .unwrap()
        .generate(&GenerationRequest::new("Hello"))
        .await
        .unwrap_err();

    match err {
        AirError::ProviderRequestFailed { provider, reason } => {
            assert_eq!(provider, ProviderId::OpenAI);
            assert!(reason.contains("429"), "{}", reason);
            assert!(reason.contains("Rate limit reached"), "{}", reason);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_claude_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages_response()))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Claude, Some("sk-ant-test"))
        .with_base_url(server.uri());
    let adapter = ClaudeAdapter::from_config(&config).unwrap();
    let response = adapter
        .generate(
            &GenerationRequest::new("Translate: hello")
                .with_model("claude-3-haiku-20240307")
                .with_system_prompt("You are a translator."),
        )
        .await
        .unwrap();

    assert_eq!(response.provider, ProviderId::Claude);
    assert_eq!(response.content, "Bonjour");
    assert_eq!(response.usage.prompt_tokens, 14);
    assert_eq!(response.usage.completion_tokens, 4);
    assert_eq!(response.usage.total_tokens, 18);

    let body = sent_body(&server).await;
    assert_eq!(body["system"], "You are a translator.");
    assert_eq!(body["model"], "claude-3-haiku-20240307");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_claude_omits_system_when_absent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages_response()))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Claude, Some("k")).with_base_url(server.uri());
    ClaudeAdapter::from_config(&config)
        .unwrap()
        .generate(&GenerationRequest::new("Hi"))
        .await
        .unwrap();

    let body = sent_body(&server).await;
    assert!(body.get("system").is_none());
    assert_eq!(body["model"], "claude-3-5-sonnet-20241022");
}

#[tokio::test]
async fn test_claude_overloaded_is_request_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Claude, Some("k")).with_base_url(server.uri());
    let err = ClaudeAdapter::from_config(&config)
        .unwrap()
        .generate(&GenerationRequest::new("Hi"))
        .await
        .unwrap_err();

    assert!(err.is_attempt_failure());
    let message = err.to_string();
    assert!(message.contains("529"), "{}", message);
    assert!(message.contains("overloaded_error"), "{}", message);
}

#[tokio::test]
async fn test_claude_without_text_block_is_request_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_02",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-haiku-20240307",
            "content": [],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 14, "output_tokens": 0}
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Claude, Some("k")).with_base_url(server.uri());
    let err = ClaudeAdapter::from_config(&config)
        .unwrap()
        .generate(&GenerationRequest::new("Hi"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AirError::request_failed(ProviderId::Claude, "response contained no text content")
    );
}

#[tokio::test]
async fn test_mistral_uses_openai_wire_and_default_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer mistral-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion_response("mistral-small-latest")),
        )
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::Mistral, Some("mistral-key"))
        .with_base_url(server.uri());
    let response = MistralAdapter::from_config(&config)
        .unwrap()
        .generate(&GenerationRequest::new("Hi").with_model("gpt-4o"))
        .await
        .unwrap();

    assert_eq!(response.provider, ProviderId::Mistral);
    assert_eq!(response.usage.total_tokens, 21);
    assert_eq!(sent_body(&server).await["model"], "mistral-small-latest");
}

#[tokio::test]
async fn test_attempt_deadline_is_request_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion_response("gpt-4o-mini"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderId::OpenAI, Some("k"))
        .with_base_url(server.uri())
        .with_request_timeout(Duration::from_millis(200));
    let err = OpenAIAdapter::from_config(&config)
        .unwrap()
        .generate(&GenerationRequest::new("Hi"))
        .await
        .unwrap_err();

    assert!(err.is_attempt_failure());
    assert!(err.to_string().contains("timed out"), "{}", err);
}

#[tokio::test]
async fn test_router_falls_back_over_http() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(2)
        .mount(&openai)
        .await;

    let claude = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages_response()))
        .expect(1)
        .mount(&claude)
        .await;

    let toml_str = format!(
        r#"
mode = "fallback"
providers = ["openai", "claude"]

[retry]
max_retries = 2
backoff_multiplier = 2.0
backoff_unit_ms = 5

[openai]
api_key = "sk-test"
base_url = "{}"

[claude]
api_key = "sk-ant-test"
base_url = "{}"
"#,
        openai.uri(),
        claude.uri()
    );
    let source = AirConfig::from_toml(&toml_str).unwrap().resolve_with(|_| None);
    let adapters = AdapterTable::from_source(&source).unwrap();
    let router = Router::new(&source, Arc::new(adapters), ModelRegistry::builtin());

    let response = router
        .route(&GenerationRequest::new("Hi").with_metadata("campaign", json!("spring")))
        .await
        .unwrap();

    assert_eq!(response.provider, ProviderId::Claude);
    assert_eq!(response.metadata["campaign"], "spring");
}
