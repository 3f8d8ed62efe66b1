use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;

use docqa_core::chunker::Chunker;
use docqa_core::error::Result;
use docqa_core::traits::{ensure_embeddings, Embedder, VectorIndex};
use docqa_core::types::{Chunk, ChunkMetadata, Document};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    /// Documents that produced no chunks (blank or whitespace-only text).
    pub empty_documents: usize,
    pub upserted: usize,
}

/// Offline build: chunk, embed in batches, upsert by chunk id.
pub struct IndexBuilder {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(chunker: Chunker, embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { chunker, embedder, index, batch_size: 64, show_progress: false }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }

    /// Re-running over the same documents overwrites the same rows.
    pub async fn build_index(&self, documents: &[Document]) -> Result<IndexReport> {
        let mut report = IndexReport { documents: documents.len(), ..IndexReport::default() };
        let mut chunks: Vec<Chunk> = Vec::new();
        for doc in documents {
            let doc_chunks = self.chunker.chunk(doc);
            if doc_chunks.is_empty() {
                tracing::debug!(doc_id = %doc.id, source = %doc.source_path, "document has no text to index");
                report.empty_documents += 1;
            }
            chunks.extend(doc_chunks);
        }
        report.chunks = chunks.len();
        if chunks.is_empty() {
            tracing::warn!(documents = documents.len(), "no chunks to index");
            return Ok(report);
        }
        tracing::info!(chunks = chunks.len(), index = self.index.name(), embedder = self.embedder.embedder_id(), "indexing");

        let pb = self.progress_bar(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let ids: Vec<String> = batch.iter().map(|c| c.chunk_id.clone()).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let metadatas: Vec<ChunkMetadata> = batch.iter().map(Chunk::metadata).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            ensure_embeddings(texts.len(), self.embedder.dim(), &vectors)?;
            self.index.upsert(&ids, &texts, &metadatas, &vectors).await?;
            report.upserted += batch.len();
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("done");
        tracing::info!(upserted = report.upserted, "index build complete");
        Ok(report)
    }
}
