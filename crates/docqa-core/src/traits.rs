use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{ChatMessage, ChunkId, ChunkMetadata, QueryResult, RetrievedChunk, ScoreScale};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `local:bge-m3:d1024`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality.
    fn dim(&self) -> usize;
    /// Embed a batch of texts; one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        ensure_embeddings(1, self.dim(), &out)?;
        Ok(out.remove(0))
    }
}

/// Reject short batches and empty or wrongly sized vectors.
pub fn ensure_embeddings(expected: usize, dim: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::ExternalCall {
            service: "embedding",
            message: format!("expected {expected} vectors, got {}", vectors.len()),
        });
    }
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.is_empty() || v.len() != dim) {
        return Err(Error::ExternalCall {
            service: "embedding",
            message: format!("vector {i} has dimension {} (expected {dim})", v.len()),
        });
    }
    Ok(())
}

/// Nearest-neighbour store keyed by chunk id.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Collection/table name, used in error messages.
    fn name(&self) -> &str;

    /// Insert or overwrite rows. All four slices are positionally aligned.
    async fn upsert(
        &self,
        ids: &[ChunkId],
        texts: &[String],
        metadatas: &[ChunkMetadata],
        vectors: &[Vec<f32>],
    ) -> Result<()>;

    /// The `k` closest rows, ordered by ascending distance.
    async fn query(&self, vector: &[f32], k: usize) -> Result<QueryResult>;

    async fn count(&self) -> Result<usize>;
}

pub fn ensure_aligned(
    ids: &[ChunkId],
    texts: &[String],
    metadatas: &[ChunkMetadata],
    vectors: &[Vec<f32>],
) -> Result<()> {
    let n = ids.len();
    if texts.len() != n || metadatas.len() != n || vectors.len() != n {
        return Err(Error::InvalidInput(format!(
            "upsert arrays differ in length: ids={n} texts={} metadatas={} vectors={}",
            texts.len(),
            metadatas.len(),
            vectors.len()
        )));
    }
    Ok(())
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, messages: &[ChatMessage], temperature: f32, max_tokens: u32) -> Result<String>;
}

/// Second-stage ordering of retrieved candidates.
///
/// Implementations return a permutation of a prefix-truncated input with at
/// most `top_k` entries. Chunk fields pass through untouched; only the score
/// field named by `scale` may be written.
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;
    fn scale(&self) -> ScoreScale;
    fn rerank(&self, question: &str, candidates: Vec<RetrievedChunk>, top_k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Token measure used by the chunker.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_embeddings_rejects_empty_vectors() {
        let err = ensure_embeddings(2, 3, &[vec![1.0, 0.0, 0.0], vec![]]).expect_err("empty vector");
        assert!(matches!(err, Error::ExternalCall { service: "embedding", .. }));
        assert!(ensure_embeddings(1, 3, &[]).is_err());
        assert!(ensure_embeddings(1, 3, &[vec![0.0; 3]]).is_ok());
    }

    #[test]
    fn ensure_aligned_checks_every_array() {
        let meta = ChunkMetadata {
            doc_id: "d".into(),
            title: "t".into(),
            source: "s".into(),
            page: None,
            section: 0,
        };
        let ids = vec!["d_0_0".to_string()];
        let texts = vec!["x".to_string()];
        assert!(ensure_aligned(&ids, &texts, &[meta.clone()], &[vec![0.0]]).is_ok());
        assert!(ensure_aligned(&ids, &texts, &[meta], &[]).is_err());
    }
}
