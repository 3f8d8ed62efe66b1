use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docqa_core::config::{expand_path, Config, EmbeddingProvider, RerankerKind, Settings, TokenCounterKind};
use docqa_core::traits::{ChatModel, Embedder, Reranker, VectorIndex};
use docqa_core::Chunker;
use docqa_embed::{fake_forced, get_default_embedder, resolve_model_dir, CrossEncoderReranker, TokenizerCounter};
use docqa_llm::{ChatConfig, EmbeddingConfig, OpenAiChatClient, OpenAiEmbedder};
use docqa_rag::{DistanceReranker, FallbackReranker, PipelineOptions, RagPipeline};
use docqa_vector::LanceVectorIndex;

/// `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn load_settings() -> Result<(Config, Settings)> {
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    tracing::info!(env = config.env_name(), "configuration loaded");
    Ok((config, settings))
}

pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    if settings.embedding.provider == EmbeddingProvider::Remote && !fake_forced() {
        let embedder = OpenAiEmbedder::new(EmbeddingConfig::from(settings))?;
        tracing::info!(model = %settings.embedding.model, dim = settings.embedding.dim, "using remote embeddings");
        return Ok(Arc::new(embedder));
    }
    get_default_embedder(&settings.embedding)
}

/// Opens the table sized for `embedder`; a missing table is only an error at
/// query time.
pub async fn open_index(settings: &Settings, embedder: &dyn Embedder) -> Result<Arc<dyn VectorIndex>> {
    let index = LanceVectorIndex::open(&settings.index.db_path(), &settings.index.table, embedder.dim()).await?;
    Ok(Arc::new(index))
}

pub fn build_chat(settings: &Settings) -> Result<Arc<dyn ChatModel>> {
    Ok(Arc::new(OpenAiChatClient::new(ChatConfig::from(&settings.llm))?))
}

pub fn build_reranker(settings: &Settings) -> Result<Arc<dyn Reranker>> {
    match settings.rag.reranker {
        RerankerKind::Distance => Ok(Arc::new(DistanceReranker)),
        RerankerKind::CrossEncoder => {
            let dir = settings
                .rag
                .cross_encoder_dir
                .as_deref()
                .map(expand_path)
                .context("rag.cross_encoder_dir is required when rag.reranker = \"cross_encoder\"")?;
            let model = CrossEncoderReranker::load(&dir)?;
            Ok(Arc::new(FallbackReranker::new(Arc::new(model))))
        }
    }
}

pub fn build_chunker(settings: &Settings) -> Result<Chunker> {
    let config = settings.chunking.chunking_config();
    match settings.chunking.token_counter {
        TokenCounterKind::Words => Ok(Chunker::new(config)),
        TokenCounterKind::Tokenizer => {
            let path: PathBuf = match settings.chunking.tokenizer_path.as_deref() {
                Some(p) => expand_path(p),
                None => resolve_model_dir(settings.embedding.model_dir.as_deref())?.join("tokenizer.json"),
            };
            tracing::info!(tokenizer = %path.display(), "counting chunk tokens with tokenizer");
            Ok(Chunker::with_counter(config, Box::new(TokenizerCounter::from_file(&path)?)))
        }
    }
}

/// Every query-time collaborator, built once.
pub async fn build_pipeline(settings: &Settings) -> Result<RagPipeline> {
    let embedder = build_embedder(settings)?;
    let index = open_index(settings, embedder.as_ref()).await?;
    let chat = build_chat(settings)?;
    let reranker = build_reranker(settings)?;
    tracing::info!(
        embedder = embedder.embedder_id(),
        index = index.name(),
        chat = chat.model_name(),
        reranker = reranker.name(),
        "pipeline ready"
    );
    Ok(RagPipeline::new(embedder, index, chat, reranker, PipelineOptions::from(&settings.rag)))
}
