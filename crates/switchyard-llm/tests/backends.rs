//! HTTP-level tests for the three network backends
//!
//! Each backend is pointed at a wiremock server standing in for LM Studio,
//! an Ollama daemon, or the remote chat API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use switchyard_llm::{
    Backend, LocalChatBackend, MeteredBackend, OllamaBackend, Router, Task, TaskKind,
};

fn chat_body(content: &str, total_tokens: Option<u64>) -> serde_json::Value {
    let mut body = json!({
        "model": "served-model",
        "choices": [{"message": {"role": "assistant", "content": content}}]
    });
    if let Some(tokens) = total_tokens {
        body["usage"] = json!({"prompt_tokens": tokens / 2, "completion_tokens": tokens / 2, "total_tokens": tokens});
    }
    body
}

fn task() -> Task {
    Task::new(TaskKind::Quality, "fn add(a: i32, b: i32) -> i32 { a + b }")
}

// ============================================================================
// Local chat server
// ============================================================================

#[tokio::test]
async fn test_local_chat_success_reports_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "qwen2.5-coder-7b-instruct", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("Looks fine.", Some(42))))
        .expect(1)
        .mount(&server)
        .await;

    let backend = LocalChatBackend::new("local", &server.uri(), "qwen2.5-coder-7b-instruct");
    let result = backend.execute(&task()).await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(result.content, "Looks fine.");
    assert_eq!(result.backend_id, "local");
    assert_eq!(result.model_id, "qwen2.5-coder-7b-instruct");
    assert_eq!(result.tokens_used, 42);
    assert_eq!(result.cost_estimate, 0.0);
}

#[tokio::test]
async fn test_local_chat_estimates_tokens_without_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("abcdefghijklmnop", None)))
        .mount(&server)
        .await;

    let backend = LocalChatBackend::new("local", &server.uri(), "qwen");
    let result = backend.execute(&task()).await;
    assert!(result.success);
    assert_eq!(result.tokens_used, 4);
}

#[tokio::test]
async fn test_local_chat_http_error_becomes_failed_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let backend = LocalChatBackend::new("local", &server.uri(), "qwen");
    let result = backend.execute(&task()).await;

    assert!(!result.success);
    assert!(result.content.is_empty());
    assert_eq!(result.error.as_deref(), Some("HTTP 500: model crashed"));
    assert_eq!(result.category.as_deref(), Some("provider_http_error"));
}

#[tokio::test]
async fn test_local_chat_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let backend = LocalChatBackend::new("local", &server.uri(), "qwen");
    let result = backend.execute(&task()).await;
    assert!(!result.success);
    assert_eq!(result.category.as_deref(), Some("provider_invalid_response"));
}

#[tokio::test]
async fn test_local_chat_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body("late", Some(1)))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let backend =
        LocalChatBackend::new("local", &server.uri(), "qwen").with_timeout(Duration::from_millis(200));
    let result = backend.execute(&task()).await;
    assert!(!result.success);
    assert_eq!(result.category.as_deref(), Some("provider_transport_error"));
}

#[tokio::test]
async fn test_local_chat_probe_uses_model_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let up = LocalChatBackend::new("local", &server.uri(), "qwen");
    assert!(up.is_available().await);

    let down = LocalChatBackend::new("local", "http://127.0.0.1:9", "qwen")
        .with_probe_timeout(Duration::from_millis(200));
    assert!(!down.is_available().await);
}

// ============================================================================
// Ollama
// ============================================================================

#[tokio::test]
async fn test_ollama_generate_counts_eval_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "llama3.1", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1",
            "response": "No issues found.",
            "done": true,
            "prompt_eval_count": 30,
            "eval_count": 12
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    let backend = OllamaBackend::with_url("ollama", &server.uri(), "llama3.1");
    assert!(backend.is_available().await);

    let result = backend.execute(&task()).await;
    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(result.content, "No issues found.");
    assert_eq!(result.tokens_used, 42);
    assert_eq!(result.cost_estimate, 0.0);
}

#[tokio::test]
async fn test_ollama_not_found_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'llama3.1' not found"))
        .mount(&server)
        .await;

    let backend = OllamaBackend::with_url("ollama", &server.uri(), "llama3.1");
    let result = backend.execute(&task()).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("HTTP 404: model 'llama3.1' not found"));
}

// ============================================================================
// Metered remote API
// ============================================================================

#[tokio::test]
async fn test_metered_sends_bearer_and_prices_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("Reviewed.", Some(1000))))
        .expect(1)
        .mount(&server)
        .await;

    let backend = MeteredBackend::new("remote", &server.uri(), "gpt-4o", Some("sk-test".into()));
    let result = backend.execute(&task()).await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(result.tokens_used, 1000);
    assert!((result.cost_estimate - 0.004375).abs() < 1e-9);
}

#[tokio::test]
async fn test_metered_without_credential_never_calls_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("x", Some(1))))
        .expect(0)
        .mount(&server)
        .await;

    let backend = MeteredBackend::new("remote", &server.uri(), "gpt-4o", None);
    assert!(!backend.is_available().await);

    let result = backend.execute(&task()).await;
    assert!(!result.success);
    assert_eq!(result.category.as_deref(), Some("provider_auth_missing"));
}

#[tokio::test]
async fn test_metered_unauthorized_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})))
        .mount(&server)
        .await;

    let backend = MeteredBackend::new("remote", &server.uri(), "gpt-4o", Some("sk-wrong".into()));
    let result = backend.execute(&task()).await;
    assert!(!result.success);
    assert!(result.error.unwrap_or_default().starts_with("HTTP 401"));
}

// ============================================================================
// Router over real HTTP backends
// ============================================================================

#[tokio::test]
async fn test_router_routes_around_dead_local_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Served by ollama.",
            "prompt_eval_count": 5,
            "eval_count": 5
        })))
        .mount(&server)
        .await;

    let local = LocalChatBackend::new("local", "http://127.0.0.1:9", "qwen")
        .with_probe_timeout(Duration::from_millis(200))
        .with_timeout(Duration::from_millis(500));
    let router = Router::builder()
        .backend(Arc::new(local))
        .backend(Arc::new(OllamaBackend::with_url("ollama", &server.uri(), "llama3.1")))
        .backend(Arc::new(MeteredBackend::openai("remote", None)))
        .fallback_order(["local", "ollama", "remote"])
        .build();

    let result = router.route(&task()).await;
    assert!(result.success);
    assert_eq!(result.backend_id, "ollama");
    assert_eq!(result.content, "Served by ollama.");
    assert_eq!(router.spend(), 0.0);
}
