use std::sync::Arc;

use docqa_core::error::{Error, Result};
use docqa_core::traits::{Embedder, VectorIndex};
use docqa_core::types::{Chunk, QueryResult, RetrievedChunk};

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// The `k` nearest chunks to `question`, in index order. An index with no
    /// rows yields an empty vector.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let vector = self.embedder.embed(question).await?;
        let rows = self.index.query(&vector, k).await?;
        let candidates = zip_rows(rows)?;
        tracing::debug!(k, hits = candidates.len(), index = self.index.name(), "retrieved");
        Ok(candidates)
    }
}

/// Pair up the parallel query arrays by position.
pub fn zip_rows(rows: QueryResult) -> Result<Vec<RetrievedChunk>> {
    let n = rows.ids.len();
    if rows.documents.len() != n || rows.metadatas.len() != n || rows.distances.len() != n {
        return Err(Error::Operation(format!(
            "index returned misaligned rows: ids={n} documents={} metadatas={} distances={}",
            rows.documents.len(),
            rows.metadatas.len(),
            rows.distances.len()
        )));
    }
    Ok(rows
        .ids
        .into_iter()
        .zip(rows.documents)
        .zip(rows.metadatas)
        .zip(rows.distances)
        .map(|(((id, text), meta), distance)| RetrievedChunk::with_distance(Chunk::from_parts(id, text, meta), distance))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::ChunkMetadata;

    fn meta(doc: &str, section: u32) -> ChunkMetadata {
        ChunkMetadata { doc_id: doc.into(), title: doc.into(), source: format!("{doc}.md"), page: None, section }
    }

    #[test]
    fn rows_are_zipped_by_position_not_id() {
        // ids deliberately out of lexical order
        let rows = QueryResult {
            ids: vec!["z_0_0".into(), "a_1_0".into()],
            documents: vec!["zeta".into(), "alpha".into()],
            metadatas: vec![meta("z", 0), meta("a", 1)],
            distances: vec![0.2, 0.7],
        };
        let out = zip_rows(rows).expect("zip");
        assert_eq!(out[0].chunk.chunk_id, "z_0_0");
        assert_eq!(out[0].chunk.text, "zeta");
        assert_eq!(out[0].distance, Some(0.2));
        assert_eq!(out[1].chunk.doc_id, "a");
        assert_eq!(out[1].chunk.section_index, 1);
        assert_eq!(out[1].relevance, None);
    }

    #[test]
    fn empty_rows_give_no_candidates() {
        assert!(zip_rows(QueryResult::default()).expect("zip").is_empty());
    }

    #[test]
    fn misaligned_rows_are_an_error() {
        let rows = QueryResult {
            ids: vec!["a_0_0".into()],
            documents: vec![],
            metadatas: vec![meta("a", 0)],
            distances: vec![0.1],
        };
        assert!(zip_rows(rows).is_err());
    }
}
