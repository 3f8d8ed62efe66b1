use std::collections::HashSet;

use docqa_core::types::{RetrievedChunk, Source};

pub const SNIPPET_CHARS: usize = 300;
pub const INLINE_CITATIONS: usize = 3;

/// One [`Source`] per `(doc_id, section)`, first occurrence in ranked order wins.
pub fn aggregate(chunks: &[RetrievedChunk]) -> Vec<Source> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert((c.chunk.doc_id.as_str(), c.chunk.section_index)))
        .map(|c| Source {
            title: c.chunk.title.clone(),
            page: c.chunk.page,
            section: c.chunk.section_index,
            source_path: c.chunk.source_path.clone(),
            doc_id: c.chunk.doc_id.clone(),
            snippet: snippet(&c.chunk.text),
        })
        .collect()
}

/// First [`SNIPPET_CHARS`] characters, with `...` appended when cut.
pub fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `"{answer} {tag1} {tag2} {tag3}"`, trimmed.
pub fn append_inline_citations(answer: &str, sources: &[Source]) -> String {
    let tags = sources.iter().take(INLINE_CITATIONS).map(Source::citation_tag).collect::<Vec<_>>().join(" ");
    format!("{answer} {tags}").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk;

    fn retrieved(doc: &str, title: &str, section: u32, page: Option<u32>, text: &str) -> RetrievedChunk {
        RetrievedChunk::with_distance(chunk(doc, title, section, page, text), 0.5)
    }

    #[test]
    fn short_text_is_kept_whole() {
        let sources = aggregate(&[retrieved("p1", "Policy", 1, Some(2), "Refunds must be requested within 30 days.")]);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].snippet, "Refunds must be requested within 30 days.");
        assert_eq!(sources[0].page, Some(2));
        assert_eq!(sources[0].section, 1);
        assert_eq!(sources[0].source_path, "data/raw/Policy.md");
    }

    #[test]
    fn duplicate_doc_section_keeps_first() {
        let sources = aggregate(&[
            retrieved("p1", "Policy", 1, None, "first snippet"),
            retrieved("p1", "Policy", 1, None, "second snippet"),
            retrieved("p1", "Policy", 2, None, "other section"),
        ]);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].snippet, "first snippet");
        assert_eq!(sources[1].section, 2);
    }

    #[test]
    fn aggregate_of_nothing_is_empty() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn snippet_truncates_on_characters() {
        let long = "é".repeat(310);
        let s = snippet(&long);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 3);
        let exact = "a".repeat(SNIPPET_CHARS);
        assert_eq!(snippet(&exact), exact);
    }

    #[test]
    fn inline_citations_use_first_three_sources() {
        let sources = aggregate(&[
            retrieved("a", "A", 0, Some(1), "x"),
            retrieved("b", "B", 1, None, "x"),
            retrieved("c", "C", 2, None, "x"),
            retrieved("d", "D", 3, None, "x"),
        ]);
        assert_eq!(append_inline_citations("The answer.", &sources), "The answer. [A#p1-c0] [B-c1] [C-c2]");
        assert_eq!(append_inline_citations("  The answer. ", &[]), "The answer.");
    }
}
