//! Heading-aware, sentence-packing chunker.
//!
//! Token counts go through [`TokenCounter`]; the default [`WordCounter`] uses
//! whitespace-separated words as the token proxy. Overlap between consecutive
//! chunks is measured in whole sentences: `overlap_tokens / 10` of them are
//! carried into the next chunk.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::traits::TokenCounter;
use crate::types::{Chunk, Document};

/// Overlap tokens that make up one carried sentence.
pub const OVERLAP_TOKENS_PER_SENTENCE: usize = 10;

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s").expect("heading regex"));
static CAPS_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9 \-/]{8,}$").expect("caps regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 400, overlap_tokens: 60 }
    }
}

impl ChunkingConfig {
    pub fn overlap_sentences(&self) -> usize {
        self.overlap_tokens / OVERLAP_TOKENS_PER_SENTENCE
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

pub struct Chunker {
    config: ChunkingConfig,
    counter: Box<dyn TokenCounter>,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self::with_counter(config, Box::new(WordCounter))
    }

    pub fn with_counter(config: ChunkingConfig, counter: Box<dyn TokenCounter>) -> Self {
        Self { config, counter }
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Split one document into chunks. Never returns a chunk with blank text.
    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let sections = split_sections(&doc.text);
        let mut out = Vec::new();
        for (section_index, section) in sections.iter().enumerate() {
            let section_index = u32::try_from(section_index).unwrap_or(u32::MAX);
            let sentences = split_sentences(section);
            for (chunk_index, (first, text)) in self.pack(&sentences).into_iter().enumerate() {
                if text.trim().is_empty() {
                    continue;
                }
                let page = doc.page_at(offset_in(&doc.text, first));
                let chunk_index = u32::try_from(chunk_index).unwrap_or(u32::MAX);
                out.push(Chunk {
                    chunk_id: Chunk::make_id(&doc.id, section_index, chunk_index),
                    doc_id: doc.id.clone(),
                    title: doc.title.clone(),
                    section_index,
                    page,
                    text,
                    source_path: doc.source_path.clone(),
                });
            }
        }
        tracing::debug!(doc_id = %doc.id, sections = sections.len(), chunks = out.len(), "chunked document");
        out
    }

    pub fn chunk_all(&self, docs: &[Document]) -> Vec<Chunk> {
        docs.iter().flat_map(|d| self.chunk(d)).collect()
    }

    /// Greedy sentence packing.
    ///
    /// A chunk closes when the next sentence would push it past `max_tokens`.
    /// The next chunk is seeded with up to `overlap_sentences` trailing
    /// sentences of the closed one, dropping carried sentences from the front
    /// until the incoming sentence fits. A single sentence longer than
    /// `max_tokens` still becomes its own chunk.
    ///
    /// Each chunk comes back with its first sentence, which locates it in the
    /// document.
    fn pack<'a>(&self, sentences: &[&'a str]) -> Vec<(&'a str, String)> {
        let max = self.config.max_tokens;
        let carry = self.config.overlap_sentences();
        let mut chunks = Vec::new();
        let mut cur: Vec<(&'a str, usize)> = Vec::new();
        let mut cur_len = 0usize;
        for &sentence in sentences {
            let tok = self.counter.count(sentence);
            if cur_len + tok > max && !cur.is_empty() {
                chunks.push((cur[0].0, join(&cur)));
                let dropped = cur.len() - carry.min(cur.len());
                cur.drain(..dropped);
                cur_len = cur.iter().map(|(_, n)| n).sum();
                while !cur.is_empty() && cur_len + tok > max {
                    let (_, n) = cur.remove(0);
                    cur_len -= n;
                }
            }
            cur.push((sentence, tok));
            cur_len += tok;
        }
        if !cur.is_empty() {
            chunks.push((cur[0].0, join(&cur)));
        }
        chunks
    }
}

/// Byte offset of `inner` within `outer`; `inner` must be a subslice.
fn offset_in(outer: &str, inner: &str) -> usize {
    (inner.as_ptr() as usize).saturating_sub(outer.as_ptr() as usize).min(outer.len())
}

fn join(sentences: &[(&str, usize)]) -> String {
    sentences.iter().map(|(s, _)| *s).collect::<Vec<_>>().join(" ")
}

/// `chunk(document, max_tokens, overlap_tokens)` with the word-count proxy.
pub fn chunk_document(doc: &Document, max_tokens: usize, overlap_tokens: usize) -> Vec<Chunk> {
    Chunker::new(ChunkingConfig { max_tokens, overlap_tokens }).chunk(doc)
}

/// Split text into trimmed, non-empty sections.
///
/// A section starts before any line (except the first) that begins with a
/// markdown heading marker or consists only of an all-caps title of at least
/// nine characters.
pub fn split_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0usize;
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if offset > 0 && (HEADING.is_match(line) || CAPS_TITLE.is_match(bare)) {
            push_trimmed(&mut sections, &text[start..offset]);
            start = offset;
        }
        offset += line.len();
    }
    push_trimmed(&mut sections, &text[start..]);
    if sections.is_empty() {
        sections.push(text.trim());
    }
    sections
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

/// Split after `.`, `!` or `?` followed by whitespace. The whitespace run is
/// dropped; everything else is kept verbatim.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut prev: Option<char> = None;
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            if i > start {
                out.push(&text[start..i]);
            }
            let mut end = i + c.len_utf8();
            while let Some(&(j, d)) = iter.peek() {
                if !d.is_whitespace() {
                    break;
                }
                end = j + d.len_utf8();
                iter.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }
    if start < text.len() && !text[start..].trim().is_empty() {
        out.push(&text[start..]);
    }
    out
}
