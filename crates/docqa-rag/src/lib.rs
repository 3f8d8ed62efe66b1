//! Query-time RAG flow: retrieve, rerank, assemble the prompt, call the chat
//! model and aggregate sources. Also the offline index build and answer
//! evaluation metrics.

pub mod eval;
pub mod indexing;
pub mod pipeline;
pub mod prompt;
pub mod rerank;
pub mod retriever;
pub mod sources;

pub use indexing::{IndexBuilder, IndexReport};
pub use pipeline::{PipelineOptions, RagPipeline};
pub use rerank::{DistanceReranker, FallbackReranker};
pub use retriever::Retriever;

#[cfg(test)]
pub(crate) mod testing {
    use docqa_core::types::{Chunk, RetrievedChunk};

    pub fn chunk(doc_id: &str, title: &str, section: u32, page: Option<u32>, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("{doc_id}_{section}_0"),
            doc_id: doc_id.into(),
            title: title.into(),
            section_index: section,
            page,
            text: text.into(),
            source_path: format!("data/raw/{title}.md"),
        }
    }

    pub fn scored(id: &str, distance: Option<f32>) -> RetrievedChunk {
        RetrievedChunk { chunk: chunk(id, id, 0, None, id), distance, relevance: None }
    }

    pub fn ids(chunks: &[RetrievedChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.chunk.doc_id.as_str()).collect()
    }
}
