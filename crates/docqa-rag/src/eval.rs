//! Answer-quality metrics over a JSONL dataset of `{question, answer}` pairs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::pipeline::RagPipeline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalExample {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EvalSummary {
    pub questions: usize,
    pub exact_match: f64,
    pub f1: f64,
}

impl fmt::Display for EvalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q: {} | EM: {:.3} | F1: {:.3}", self.questions, self.exact_match, self.f1)
    }
}

fn keep(c: char) -> bool {
    // ASCII alphanumerics plus lowercase accented Latin (à..û)
    c.is_ascii_lowercase() || c.is_ascii_digit() || ('\u{e0}'..='\u{fb}').contains(&c)
}

/// Lowercase, replace everything but letters and digits with spaces, collapse
/// whitespace.
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let cleaned: String = lowered.chars().map(|c| if keep(c) { c } else { ' ' }).collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn exact_match(pred: &str, gold: &str) -> f64 {
    if normalize(pred) == normalize(gold) {
        1.0
    } else {
        0.0
    }
}

/// Token-overlap F1 on normalized text; 0 when either side is empty.
pub fn token_f1(pred: &str, gold: &str) -> f64 {
    let p = normalize(pred);
    let g = normalize(gold);
    let p: Vec<&str> = p.split_whitespace().collect();
    let g: Vec<&str> = g.split_whitespace().collect();
    if p.is_empty() || g.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in &g {
        *counts.entry(*t).or_default() += 1;
    }
    let mut overlap = 0usize;
    for t in &p {
        if let Some(n) = counts.get_mut(t) {
            if *n > 0 {
                *n -= 1;
                overlap += 1;
            }
        }
    }
    if overlap == 0 {
        return 0.0;
    }
    let precision = overlap as f64 / p.len() as f64;
    let recall = overlap as f64 / g.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

pub fn read_dataset(path: &Path) -> Result<Vec<EvalExample>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| serde_json::from_str(line).with_context(|| format!("{}:{}", path.display(), i + 1)))
        .collect()
}

pub fn summarize(scores: &[(f64, f64)]) -> EvalSummary {
    if scores.is_empty() {
        return EvalSummary::default();
    }
    let n = scores.len() as f64;
    EvalSummary {
        questions: scores.len(),
        exact_match: scores.iter().map(|s| s.0).sum::<f64>() / n,
        f1: scores.iter().map(|s| s.1).sum::<f64>() / n,
    }
}

/// Ask every question in order; any pipeline error aborts the run.
pub async fn evaluate(pipeline: &RagPipeline, examples: &[EvalExample]) -> Result<EvalSummary> {
    let mut scores = Vec::with_capacity(examples.len());
    for ex in examples {
        let response = pipeline.ask(&ex.question).await?;
        let em = exact_match(&response.answer, &ex.answer);
        let f1 = token_f1(&response.answer, &ex.answer);
        tracing::debug!(question = %ex.question, em, f1, "evaluated");
        scores.push((em, f1));
    }
    Ok(summarize(&scores))
}
