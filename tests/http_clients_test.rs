//! Chat and embedding clients against a mock OpenAI-compatible server.

use mockito::{Matcher, Server};

use multiverse::adapters::embeddings::OpenAiEmbeddingProvider;
use multiverse::adapters::llm::{ChatMessage, ChatModel, ChatRequest, OpenAiChatClient};
use multiverse::domain::errors::{DomainError, ServiceError};
use multiverse::domain::models::{EmbeddingBackend, EmbeddingConfig, LlmConfig};
use multiverse::domain::ports::EmbeddingProvider;
use multiverse::services::{BudgetTracker, RetryPolicy};

fn llm_config(base_url: String, moderation: bool) -> LlmConfig {
    LlmConfig {
        base_url,
        api_key: Some("test-key".to_string()),
        moderation,
        requests_per_second: 100,
        request_timeout_secs: 5,
        ..LlmConfig::default()
    }
}

fn request(content: &str) -> ChatRequest {
    ChatRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![ChatMessage::system("Be brief."), ChatMessage::user(content)],
        temperature: 0.0,
        json_mode: false,
    }
}

fn completion_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 1000, "completion_tokens": 1000 }
    })
    .to_string()
}

fn moderation_body(flagged: bool) -> String {
    serde_json::json!({
        "results": [{ "flagged": flagged, "categories": { "harassment": flagged, "violence": false } }]
    })
    .to_string()
}

#[tokio::test]
async fn test_chat_success_records_cost() {
    let mut server = Server::new_async().await;
    let moderation = server
        .mock("POST", "/moderations")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(moderation_body(false))
        .create_async()
        .await;
    let completion = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(serde_json::json!({ "model": "gpt-4o-mini" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body("  Hello there.  "))
        .create_async()
        .await;

    let budget = BudgetTracker::unlimited();
    let client = OpenAiChatClient::new(&llm_config(server.url(), true), RetryPolicy::none(), budget.clone()).unwrap();

    let reply = client.chat(request("Say hello")).await.unwrap();
    assert_eq!(reply.content, "Hello there.");
    assert_eq!(reply.usage.prompt_tokens, 1000);
    assert!((reply.usage.cost_usd - 0.000_75).abs() < 1e-12);

    let snapshot = budget.snapshot().await;
    assert_eq!(snapshot.calls, 1);
    assert!((snapshot.spent_usd - 0.000_75).abs() < 1e-12);

    moderation.assert_async().await;
    completion.assert_async().await;
}

#[tokio::test]
async fn test_flagged_content_is_policy_violation() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/moderations")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(moderation_body(true))
        .create_async()
        .await;
    let completion = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let client =
        OpenAiChatClient::new(&llm_config(server.url(), true), RetryPolicy::none(), BudgetTracker::unlimited()).unwrap();

    let err = client.chat(request("something rude")).await.unwrap_err();
    assert!(err.is_policy_violation(), "unexpected error: {err}");
    completion.assert_async().await;
}

#[tokio::test]
async fn test_moderation_outage_fails_open() {
    let mut server = Server::new_async().await;
    server.mock("POST", "/moderations").with_status(503).create_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body("ok"))
        .create_async()
        .await;

    let client =
        OpenAiChatClient::new(&llm_config(server.url(), true), RetryPolicy::none(), BudgetTracker::unlimited()).unwrap();
    assert_eq!(client.chat(request("hi")).await.unwrap().content, "ok");
}

#[tokio::test]
async fn test_server_errors_are_retried_then_surface_as_transient() {
    let mut server = Server::new_async().await;
    let completion = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .expect(3)
        .create_async()
        .await;

    let budget = BudgetTracker::unlimited();
    let client = OpenAiChatClient::new(&llm_config(server.url(), false), RetryPolicy::new(2, 5, 20), budget.clone()).unwrap();

    let err = client.chat(request("hi")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Transient(_)), "unexpected error: {err}");
    assert_eq!(budget.snapshot().await.calls, 0);
    completion.assert_async().await;
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let completion = server
        .mock("POST", "/chat/completions")
        .with_status(400)
        .with_body("bad request")
        .expect(1)
        .create_async()
        .await;

    let client = OpenAiChatClient::new(
        &llm_config(server.url(), false),
        RetryPolicy::new(3, 5, 20),
        BudgetTracker::unlimited(),
    )
    .unwrap();

    let err = client.chat(request("hi")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Failed(_)), "unexpected error: {err}");
    completion.assert_async().await;
}

#[tokio::test]
async fn test_empty_completion_is_malformed() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body("   "))
        .create_async()
        .await;

    let client =
        OpenAiChatClient::new(&llm_config(server.url(), false), RetryPolicy::none(), BudgetTracker::unlimited()).unwrap();
    let err = client.chat(request("hi")).await.unwrap_err();
    assert!(matches!(err, ServiceError::MalformedResponse(_)));
}

fn embedding_config(dimension: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: EmbeddingBackend::Openai,
        dimension,
        model: "text-embedding-3-small".to_string(),
    }
}

#[tokio::test]
async fn test_embeddings_returned_and_dimension_checked() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/embeddings")
        .match_body(Matcher::PartialJson(serde_json::json!({ "dimensions": 3 })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":[{"index":0,"embedding":[0.1,0.2,0.3]}]}"#)
        .create_async()
        .await;
    // Any other request gets the same three-element vector.
    server
        .mock("POST", "/embeddings")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":[{"index":0,"embedding":[0.1,0.2,0.3]}]}"#)
        .create_async()
        .await;

    let llm = llm_config(server.url(), false);
    let provider = OpenAiEmbeddingProvider::new(&embedding_config(3), &llm, RetryPolicy::none()).unwrap();
    assert_eq!(provider.embed("hello").await.unwrap(), vec![0.1, 0.2, 0.3]);

    let mismatched = OpenAiEmbeddingProvider::new(&embedding_config(4), &llm, RetryPolicy::none()).unwrap();
    assert!(matches!(
        mismatched.embed("hello").await,
        Err(DomainError::Service(ServiceError::MalformedResponse(_)))
    ));
}
