use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp};
use candle_nn::{Linear, Module};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::path::Path;
use tokenizers::Tokenizer;

use docqa_core::error::Error;
use docqa_core::traits::Reranker;
use docqa_core::types::{RetrievedChunk, ScoreScale};

use crate::{hidden_size, load_tokenizer, load_weights, select_device, tokenize_pairs};

const BERT_PAD_ID: u32 = 0;
const BATCH_SIZE: usize = 16;

/// BERT sequence-pair classifier (e.g. `ms-marco-MiniLM-L-6-v2`) scoring
/// `(question, passage)` relevance. Higher is better.
pub struct CrossEncoderReranker {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl CrossEncoderReranker {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading cross-encoder");
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;
        let raw_config = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let hidden = hidden_size(&raw_config)?;
        let vb = load_weights(model_dir, &device)?;
        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let classifier = candle_nn::linear(hidden, 1, vb.pp("classifier"))?;
        Ok(Self { bert, pooler, classifier, tokenizer, device, max_len: 512 })
    }

    /// One logit per passage, in input order.
    pub fn score(&self, question: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(passages.len());
        for batch in passages.chunks(BATCH_SIZE) {
            let inputs = tokenize_pairs(&self.tokenizer, question, batch, self.max_len, BERT_PAD_ID, &self.device)?;
            let hidden = self.bert.forward(&inputs.input_ids, &inputs.token_type_ids, Some(&inputs.attention_mask))?;
            let cls = hidden.i((.., 0))?;
            let pooled = self.pooler.forward(&cls)?.tanh()?;
            let logits = self.classifier.forward(&pooled)?.squeeze(1)?;
            scores.extend(logits.to_device(&Device::Cpu)?.to_vec1::<f32>()?);
        }
        if scores.len() != passages.len() {
            return Err(anyhow!("expected {} scores, got {}", passages.len(), scores.len()));
        }
        Ok(scores)
    }
}

impl Reranker for CrossEncoderReranker {
    fn name(&self) -> &str {
        "cross-encoder"
    }

    fn scale(&self) -> ScoreScale {
        ScoreScale::HigherIsBetter
    }

    fn rerank(&self, question: &str, candidates: Vec<RetrievedChunk>, top_k: usize) -> docqa_core::Result<Vec<RetrievedChunk>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let passages: Vec<&str> = candidates.iter().map(|c| c.chunk.text.as_str()).collect();
        let scores = self.score(question, &passages).map_err(|e| Error::external("reranker", e))?;
        Ok(order_by_relevance(candidates, &scores, top_k))
    }
}

/// Write `scores` into `relevance`, stable-sort descending and keep `top_k`.
pub(crate) fn order_by_relevance(mut candidates: Vec<RetrievedChunk>, scores: &[f32], top_k: usize) -> Vec<RetrievedChunk> {
    for (c, s) in candidates.iter_mut().zip(scores) {
        c.relevance = Some(*s);
    }
    candidates.sort_by(|a, b| {
        let a = a.relevance.unwrap_or(f32::NEG_INFINITY);
        let b = b.relevance.unwrap_or(f32::NEG_INFINITY);
        b.total_cmp(&a)
    });
    candidates.truncate(top_k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::Chunk;

    fn candidate(id: &str, distance: f32) -> RetrievedChunk {
        RetrievedChunk::with_distance(
            Chunk {
                chunk_id: id.into(),
                doc_id: "d".into(),
                title: "T".into(),
                section_index: 0,
                page: None,
                text: format!("text {id}"),
                source_path: "p".into(),
            },
            distance,
        )
    }

    #[test]
    fn relevance_sorted_descending_with_stable_ties() {
        let input = vec![candidate("a", 0.1), candidate("b", 0.2), candidate("c", 0.3), candidate("d", 0.4)];
        let out = order_by_relevance(input, &[0.5, 2.0, 0.5, -1.0], 3);
        let ids: Vec<&str> = out.iter().map(|c| c.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(out[0].relevance, Some(2.0));
        // retrieval distance is left alone
        assert_eq!(out[0].distance, Some(0.2));
    }
}
