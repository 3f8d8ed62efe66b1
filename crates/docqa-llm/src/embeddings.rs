use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use docqa_core::config::Settings;
use docqa_core::error::Error;
use docqa_core::traits::{ensure_embeddings, Embedder};

use crate::{build_client, endpoint, error_body};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dim: usize,
    pub timeout_secs: u64,
}

impl From<&Settings> for EmbeddingConfig {
    fn from(s: &Settings) -> Self {
        Self {
            base_url: s.embedding_base_url().to_string(),
            model: s.embedding.model.clone(),
            api_key: s.embedding_api_key().map(str::to_string),
            dim: s.embedding.dim,
            timeout_secs: s.llm.timeout_secs,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingsRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
    pub dimensions: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingsResponse {
    pub data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingItem {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
}

/// `POST {base_url}/embeddings` client.
pub struct OpenAiEmbedder {
    config: EmbeddingConfig,
    client: Client,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        let id = format!("remote:{}:d{}", config.model, config.dim);
        Ok(Self { config, client, id })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.config.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> docqa_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingsRequest { model: &self.config.model, input: texts, dimensions: self.config.dim };
        let mut builder = self.client.post(endpoint(&self.config.base_url, "embeddings")).json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| Error::external("embedding", e))?;
        if !response.status().is_success() {
            return Err(Error::external("embedding", error_body(response).await));
        }
        let mut body: EmbeddingsResponse = response.json().await.map_err(|e| Error::external("embedding", e))?;
        body.data.sort_by_key(|item| item.index);
        let vectors: Vec<Vec<f32>> = body.data.into_iter().map(|item| item.embedding).collect();
        ensure_embeddings(texts.len(), self.config.dim, &vectors)?;
        Ok(vectors)
    }
}
