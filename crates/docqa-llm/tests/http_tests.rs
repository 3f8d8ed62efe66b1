use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::time::Duration;

use docqa_core::error::Error;
use docqa_core::traits::{ChatModel, Embedder};
use docqa_core::types::ChatMessage;
use docqa_llm::{ChatConfig, EmbeddingConfig, OpenAiChatClient, OpenAiEmbedder};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/v1")
}

fn chat_config(base_url: String, timeout_secs: u64) -> ChatConfig {
    ChatConfig { base_url, model: "test-model".into(), api_key: Some("sk-test".into()), timeout_secs }
}

#[tokio::test]
async fn chat_returns_first_choice_and_sends_bearer_key() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
            let answer = format!("{} {} {}", auth, body["model"].as_str().unwrap_or_default(), body["messages"].as_array().map_or(0, Vec::len));
            Json(json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": answer}}]}))
        }),
    );
    let base = serve(app).await;
    let client = OpenAiChatClient::new(chat_config(base, 5)).expect("client");
    let out = client
        .complete(&[ChatMessage::system("s"), ChatMessage::user("u")], 0.1, 800)
        .await
        .expect("complete");
    assert_eq!(out, "Bearer sk-test test-model 2");
}

#[tokio::test]
async fn chat_http_error_is_external_call() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
    );
    let base = serve(app).await;
    let client = OpenAiChatClient::new(chat_config(base, 5)).expect("client");
    let err = client.complete(&[ChatMessage::user("u")], 0.1, 10).await.expect_err("401");
    match err {
        Error::ExternalCall { service, message } => {
            assert_eq!(service, "chat");
            assert!(message.contains("401"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn chat_timeout_is_external_call() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"choices": []}))
        }),
    );
    let base = serve(app).await;
    let client = OpenAiChatClient::new(chat_config(base, 1)).expect("client");
    let err = client.complete(&[ChatMessage::user("u")], 0.1, 10).await.expect_err("timeout");
    assert!(matches!(err, Error::ExternalCall { service: "chat", .. }));
}

#[tokio::test]
async fn embeddings_are_reordered_by_index_and_checked() {
    let app = Router::new().route(
        "/v1/embeddings",
        post(|Json(body): Json<Value>| async move {
            let n = body["input"].as_array().map_or(0, Vec::len);
            let data: Vec<Value> = (0..n).rev().map(|i| json!({"index": i, "embedding": [i as f32, 1.0, 0.0]})).collect();
            Json(json!({"data": data}))
        }),
    );
    let base = serve(app).await;
    let config = EmbeddingConfig { base_url: base, model: "emb".into(), api_key: None, dim: 3, timeout_secs: 5 };
    let embedder = OpenAiEmbedder::new(config).expect("embedder");
    let out = embedder.embed_batch(&["a".to_string(), "b".to_string()]).await.expect("embed");
    assert_eq!(out, vec![vec![0.0, 1.0, 0.0], vec![1.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn embeddings_short_response_fails_loudly() {
    let app = Router::new().route(
        "/v1/embeddings",
        post(|| async { Json(json!({"data": [{"index": 0, "embedding": [0.5, 0.5, 0.5]}]})) }),
    );
    let base = serve(app).await;
    let config = EmbeddingConfig { base_url: base, model: "emb".into(), api_key: None, dim: 3, timeout_secs: 5 };
    let embedder = OpenAiEmbedder::new(config).expect("embedder");
    let err = embedder.embed_batch(&["a".to_string(), "b".to_string()]).await.expect_err("count mismatch");
    assert!(matches!(err, Error::ExternalCall { service: "embedding", .. }));
}
