use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::{Encoding, Tokenizer};

/// Padded `[B,T]` model inputs.
pub struct Batch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, pad_id: u32, device: &Device) -> Result<Batch> {
    let encodings = texts
        .iter()
        .map(|t| tokenizer.encode(t.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e)))
        .collect::<Result<Vec<_>>>()?;
    pad(&encodings, max_len, pad_id, device)
}

/// Encode `(query, text)` pairs the way sequence-pair classifiers expect.
pub fn tokenize_pairs(tokenizer: &Tokenizer, query: &str, texts: &[&str], max_len: usize, pad_id: u32, device: &Device) -> Result<Batch> {
    let encodings = texts
        .iter()
        .map(|t| tokenizer.encode((query, *t), true).map_err(|e| anyhow!("Tokenization failed: {}", e)))
        .collect::<Result<Vec<_>>>()?;
    pad(&encodings, max_len, pad_id, device)
}

fn pad(encodings: &[Encoding], max_len: usize, pad_id: u32, device: &Device) -> Result<Batch> {
    if encodings.is_empty() {
        return Err(anyhow!("cannot build an empty batch"));
    }
    let width = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);
    let rows = encodings.len();
    let mut ids = Vec::with_capacity(rows * width);
    let mut mask = Vec::with_capacity(rows * width);
    let mut types = Vec::with_capacity(rows * width);
    for enc in encodings {
        let n = enc.get_ids().len().min(width);
        ids.extend_from_slice(&enc.get_ids()[..n]);
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        types.extend_from_slice(&enc.get_type_ids()[..n]);
        let fill = width - n;
        ids.extend(std::iter::repeat(pad_id).take(fill));
        mask.extend(std::iter::repeat(0u32).take(fill));
        types.extend(std::iter::repeat(0u32).take(fill));
    }
    Ok(Batch {
        input_ids: Tensor::from_vec(ids, (rows, width), device)?,
        attention_mask: Tensor::from_vec(mask, (rows, width), device)?,
        token_type_ids: Tensor::from_vec(types, (rows, width), device)?,
    })
}
