//! Domain types shared by the loader, chunker, index adapters and the RAG pipeline.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// A raw document produced by the loader.
///
/// - `id`: stable hash of `source_path`
/// - `title`: file stem, used in citation tags
/// - `text`: extracted plain text
/// - `page_starts`: byte offset in `text` where each page begins, for paged
///   formats (PDF); empty otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
    pub source_path: String,
    #[serde(default)]
    pub page_starts: Vec<usize>,
}

impl Document {
    /// Unpaged document.
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), text: text.into(), source_path: source_path.into(), page_starts: Vec::new() }
    }

    /// 1-based page holding byte `offset` of `text`, or `None` when unpaged.
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        if self.page_starts.is_empty() {
            return None;
        }
        let page = self.page_starts.partition_point(|&start| start <= offset).max(1);
        u32::try_from(page).ok()
    }
}

/// An independently indexed span of a document.
///
/// `chunk_id` is `{doc_id}_{section_index}_{chunk_index}`, so chunking the same
/// document twice with the same parameters yields the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub doc_id: String,
    pub title: String,
    pub section_index: u32,
    pub page: Option<u32>,
    pub text: String,
    pub source_path: String,
}

impl Chunk {
    pub fn make_id(doc_id: &str, section_index: u32, chunk_index: u32) -> ChunkId {
        format!("{doc_id}_{section_index}_{chunk_index}")
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            doc_id: self.doc_id.clone(),
            title: self.title.clone(),
            source: self.source_path.clone(),
            page: self.page,
            section: self.section_index,
        }
    }

    /// Rebuild a chunk from one row of an index query.
    pub fn from_parts(chunk_id: ChunkId, text: String, meta: ChunkMetadata) -> Self {
        Self {
            chunk_id,
            doc_id: meta.doc_id,
            title: meta.title,
            section_index: meta.section,
            page: meta.page,
            text,
            source_path: meta.source,
        }
    }

    pub fn citation_tag(&self) -> String {
        citation_tag(&self.title, self.page, self.section_index)
    }
}

/// Metadata persisted next to every vector in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub title: String,
    pub source: String,
    pub page: Option<u32>,
    pub section: u32,
}

/// A chunk returned for one query.
///
/// The retrieval distance (lower is closer) and the rerank relevance (higher is
/// better) are kept apart; nothing compares one against the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub distance: Option<f32>,
    pub relevance: Option<f32>,
}

impl RetrievedChunk {
    pub fn with_distance(chunk: Chunk, distance: f32) -> Self {
        Self { chunk, distance: Some(distance), relevance: None }
    }
}

/// Sort direction of the score a reranker orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreScale {
    /// Retrieval distance: ascending order.
    LowerIsBetter,
    /// Cross-encoder relevance: descending order.
    HigherIsBetter,
}

/// Positionally aligned rows returned by a nearest-neighbour query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<ChunkId>,
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Display-ready citation returned next to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub page: Option<u32>,
    pub section: u32,
    pub source_path: String,
    pub doc_id: String,
    pub snippet: String,
}

impl Source {
    pub fn citation_tag(&self) -> String {
        citation_tag(&self.title, self.page, self.section)
    }
}

/// `[title#p{page}-c{section}]`, or `[title-c{section}]` without a page.
pub fn citation_tag(title: &str, page: Option<u32>, section: u32) -> String {
    match page {
        Some(p) => format!("[{title}#p{p}-c{section}]"),
        None => format!("[{title}-c{section}]"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Body of a successful `/ask` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}
