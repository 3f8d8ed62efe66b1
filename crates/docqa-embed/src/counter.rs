use anyhow::Result;
use std::path::Path;
use tokenizers::Tokenizer;

use docqa_core::traits::TokenCounter;

use crate::load_tokenizer;

/// Counts model tokens (without special tokens) instead of words.
pub struct TokenizerCounter {
    tokenizer: Tokenizer,
}

impl TokenizerCounter {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(load_tokenizer(path)?))
    }
}

impl TokenCounter for TokenizerCounter {
    fn count(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(enc) => enc.get_ids().len(),
            Err(e) => {
                tracing::warn!(error = %e, "tokenizer failed; falling back to word count");
                text.split_whitespace().count()
            }
        }
    }
}
