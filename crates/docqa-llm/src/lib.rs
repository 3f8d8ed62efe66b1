//! Clients for OpenAI-compatible HTTP endpoints (OpenAI, LM Studio, Ollama,
//! vLLM): chat completions for answer synthesis and `/embeddings` for remote
//! embedding.

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

mod chat;
mod embeddings;

pub use chat::{ChatConfig, OpenAiChatClient};
pub use embeddings::{EmbeddingConfig, OpenAiEmbedder};

fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to create HTTP client")
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Turn a non-2xx response into a readable message.
async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    format!("API error ({status}): {body}")
}

#[cfg(test)]
mod tests {
    use super::endpoint;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("http://localhost:1234/v1/", "chat/completions"), "http://localhost:1234/v1/chat/completions");
        assert_eq!(endpoint("https://api.openai.com/v1", "embeddings"), "https://api.openai.com/v1/embeddings");
    }
}
