//! Second-stage orderings.
//!
//! [`DistanceReranker`] reuses the retrieval distance. Model-based rerankers
//! live in `docqa-embed`; wrap them in [`FallbackReranker`] so a model failure
//! degrades to distance order instead of failing the request.

use std::cmp::Ordering;
use std::sync::Arc;

use docqa_core::error::Result;
use docqa_core::traits::Reranker;
use docqa_core::types::{RetrievedChunk, ScoreScale};

#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceReranker;

impl DistanceReranker {
    /// Stable ascending sort on distance; unscored candidates keep their
    /// relative order after all scored ones.
    pub fn order(mut candidates: Vec<RetrievedChunk>, top_k: usize) -> Vec<RetrievedChunk> {
        candidates.sort_by(|a, b| match (a.distance, b.distance) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        candidates.truncate(top_k);
        candidates
    }
}

impl Reranker for DistanceReranker {
    fn name(&self) -> &str {
        "distance"
    }

    fn scale(&self) -> ScoreScale {
        ScoreScale::LowerIsBetter
    }

    fn rerank(&self, _question: &str, candidates: Vec<RetrievedChunk>, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        Ok(Self::order(candidates, top_k))
    }
}

pub struct FallbackReranker {
    primary: Arc<dyn Reranker>,
    name: String,
}

impl FallbackReranker {
    pub fn new(primary: Arc<dyn Reranker>) -> Self {
        let name = format!("{}+distance-fallback", primary.name());
        Self { primary, name }
    }
}

impl Reranker for FallbackReranker {
    fn name(&self) -> &str {
        &self.name
    }

    fn scale(&self) -> ScoreScale {
        self.primary.scale()
    }

    fn rerank(&self, question: &str, candidates: Vec<RetrievedChunk>, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        match self.primary.rerank(question, candidates.clone(), top_k) {
            Ok(ranked) => Ok(ranked),
            Err(e) => {
                tracing::warn!(reranker = self.primary.name(), error = %e, "reranker failed; using distance order");
                Ok(DistanceReranker::order(candidates, top_k))
            }
        }
    }
}
