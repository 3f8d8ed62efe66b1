//! Local models on candle: the BGE-M3 embedder, a hash-based fake embedder,
//! a cross-encoder reranker and a tokenizer-backed token counter.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use docqa_core::config::{expand_path, EmbeddingProvider, EmbeddingSettings};
use docqa_core::error::Error;
use docqa_core::traits::{ensure_embeddings, Embedder};

mod counter;
mod device;
mod pool;
mod rerank;
mod tokenize;

pub use counter::TokenizerCounter;
pub use device::select_device;
pub use pool::masked_mean_l2;
pub use rerank::CrossEncoderReranker;
pub use tokenize::{tokenize_batch, tokenize_pairs, Batch};

const XLM_PAD_ID: u32 = 1;
const BATCH_SIZE: usize = 16;

/// Read a weight file into a var builder; `model.safetensors` wins over
/// `pytorch_model.bin` when both exist.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let tensors: HashMap<String, Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let pickle = model_dir.join("pytorch_model.bin");
        candle_core::pickle::read_all(&pickle)
            .map_err(|e| anyhow!("Failed to read weights from {}: {}", pickle.display(), e))?
            .into_iter()
            .collect()
    };
    Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
}

#[derive(serde::Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

/// `hidden_size` of a HuggingFace `config.json`.
pub(crate) fn hidden_size(raw_config: &str) -> Result<usize> {
    Ok(serde_json::from_str::<HiddenSize>(raw_config)?.hidden_size)
}

pub(crate) fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))
}

/// Loaded weights and tokenizer, shared with blocking inference tasks.
struct BgeM3Model {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

pub struct BgeM3Embedder {
    inner: Arc<BgeM3Model>,
    dim: usize,
    id: String,
}

impl BgeM3Embedder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading BGE-M3");
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;
        let raw_config = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let dim = hidden_size(&raw_config)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!(dim, "BGE-M3 loaded");
        let inner = Arc::new(BgeM3Model { model, tokenizer, device, max_len: 512 });
        Ok(Self { inner, dim, id: format!("local:bge-m3:d{dim}") })
    }

    pub fn new() -> Result<Self> {
        Self::load(&resolve_model_dir(None)?)
    }
}

impl BgeM3Model {
    fn embed_sync(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let inputs = tokenize_batch(&self.tokenizer, batch, self.max_len, XLM_PAD_ID, &self.device)?;
            let hidden = self.model.forward(
                &inputs.input_ids,
                &inputs.attention_mask,
                &inputs.token_type_ids,
                None,
                None,
                None,
            )?;
            let pooled = masked_mean_l2(&hidden, &inputs.attention_mask)?;
            out.extend(pooled.to_device(&Device::Cpu)?.to_vec2::<f32>()?);
        }
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

#[async_trait]
impl Embedder for BgeM3Embedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> docqa_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inner = Arc::clone(&self.inner);
        let texts_owned = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || inner.embed_sync(&texts_owned))
            .await
            .map_err(|e| Error::external("embedding", e))?
            .map_err(|e| Error::external("embedding", e))?;
        ensure_embeddings(texts.len(), self.dim, &vectors)?;
        Ok(vectors)
    }
}

/// Deterministic bag-of-words hashing embedder for tests and smoke runs.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("fake:xxh64:d{dim}") }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> docqa_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// `APP_USE_FAKE_EMBEDDINGS` is set to `1` or `true`.
pub fn fake_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Local or fake embedder per settings. `APP_USE_FAKE_EMBEDDINGS=1` forces the
/// fake one regardless of the configured provider.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if fake_forced() || settings.provider == EmbeddingProvider::Fake {
        tracing::info!(dim = settings.dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.dim)));
    }
    match settings.provider {
        EmbeddingProvider::Local => {
            let embedder = BgeM3Embedder::load(&resolve_model_dir(settings.model_dir.as_deref())?)?;
            if embedder.dim() != settings.dim {
                tracing::warn!(configured = settings.dim, model = embedder.dim(), "embedding.dim differs from the model");
            }
            Ok(Arc::new(embedder))
        }
        EmbeddingProvider::Remote => Err(anyhow!("remote embeddings are not served by docqa-embed")),
        EmbeddingProvider::Fake => Ok(Arc::new(FakeEmbedder::new(settings.dim))),
    }
}

/// First existing directory among the configured one, `APP_MODEL_DIR`,
/// `MODEL_DIR`, `../models/bge-m3` and `models/bge-m3`.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    let candidates = configured
        .map(expand_path)
        .into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::env::var("MODEL_DIR").ok().map(PathBuf::from))
        .chain([PathBuf::from("../models/bge-m3"), PathBuf::from("models/bge-m3")]);
    for p in candidates {
        if p.exists() {
            tracing::info!(dir = %p.display(), "using model dir");
            return Ok(p);
        }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
