use docqa_core::types::{ChatMessage, RetrievedChunk};

/// Chunks rendered into the context, regardless of the rerank `top_k`.
pub const PROMPT_CONTEXT_LIMIT: usize = 5;

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Use the provided context faithfully. If unsure, say you don't know.";

/// `{tag}\n{text}` blocks for the first [`PROMPT_CONTEXT_LIMIT`] chunks,
/// separated by a blank line.
pub fn render_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .take(PROMPT_CONTEXT_LIMIT)
        .map(|c| format!("{}\n{}", c.chunk.citation_tag(), c.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return format!(
            "Answer the following question based on your general knowledge.\n\n\
             Question: {question}\n\n\
             Note: No relevant documents were found in the knowledge base. State this in your answer."
        );
    }
    let context = render_context(chunks);
    format!(
        "Answer the following question based ONLY on the provided context. \
         If the answer cannot be found in the context, say \"I cannot find this information in the provided documents.\"\n\n\
         Always cite your sources inline using the exact citation format provided in the context (e.g., [Document#p1-c0]).\n\n\
         Question: {question}\n\n\
         Context:\n{context}\n\n\
         Answer:"
    )
}

/// `[system, user]`, the user turn carrying [`build_prompt`].
pub fn build_messages(question: &str, chunks: &[RetrievedChunk]) -> Vec<ChatMessage> {
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(build_prompt(question, chunks))]
}
