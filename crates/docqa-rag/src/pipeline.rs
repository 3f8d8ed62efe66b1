use std::sync::Arc;
use std::time::Instant;

use docqa_core::config::RagSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::{ChatModel, Embedder, Reranker, VectorIndex};
use docqa_core::types::{AnswerResponse, RetrievedChunk};

use crate::prompt::build_messages;
use crate::retriever::Retriever;
use crate::sources::{aggregate, append_inline_citations};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub retrieve_k: usize,
    pub top_k: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub inline_citations: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&RagSettings::default())
    }
}

impl From<&RagSettings> for PipelineOptions {
    fn from(s: &RagSettings) -> Self {
        Self {
            retrieve_k: s.retrieve_k,
            top_k: s.top_k,
            temperature: s.temperature,
            max_tokens: s.max_tokens,
            inline_citations: s.inline_citations,
        }
    }
}

/// Sequential question-answering flow over shared, read-only collaborators.
pub struct RagPipeline {
    retriever: Retriever,
    reranker: Arc<dyn Reranker>,
    chat: Arc<dyn ChatModel>,
    index: Arc<dyn VectorIndex>,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chat: Arc<dyn ChatModel>,
        reranker: Arc<dyn Reranker>,
        options: PipelineOptions,
    ) -> Self {
        let retriever = Retriever::new(embedder, Arc::clone(&index));
        Self { retriever, reranker, chat, index, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub async fn ask(&self, question: &str) -> Result<AnswerResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".into()));
        }
        let start = Instant::now();

        let candidates = self.retriever.retrieve(question, self.options.retrieve_k).await?;
        let retrieved = candidates.len();
        let ranked = self.rerank(question, candidates).await?;
        let messages = build_messages(question, &ranked);
        let answer = self.chat.complete(&messages, self.options.temperature, self.options.max_tokens).await?;
        let sources = aggregate(&ranked);
        let answer = if self.options.inline_citations { append_inline_citations(&answer, &sources) } else { answer };

        tracing::info!(
            retrieved,
            ranked = ranked.len(),
            sources = sources.len(),
            reranker = self.reranker.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "question answered"
        );
        Ok(AnswerResponse { answer, sources })
    }

    /// Model rerankers do blocking inference, so they run on the blocking
    /// pool. The result never exceeds `top_k`.
    async fn rerank(&self, question: &str, candidates: Vec<RetrievedChunk>) -> Result<Vec<RetrievedChunk>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let top_k = self.options.top_k;
        let reranker = Arc::clone(&self.reranker);
        let question = question.to_string();
        let mut ranked = tokio::task::spawn_blocking(move || reranker.rerank(&question, candidates, top_k))
            .await
            .map_err(|e| Error::external("reranker", e))??;
        ranked.truncate(top_k);
        Ok(ranked)
    }
}
