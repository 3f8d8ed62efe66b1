use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, env_name })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment, env_name: "custom".to_string() }
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration, with defaults filled in and
    /// checked for the current environment.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        self.validate_for_env(&settings)?;
        Ok(settings)
    }

    fn validate_for_env(&self, settings: &Settings) -> Result<()> {
        match self.env_name.as_str() {
            "prod" | "production" => {
                if settings.embedding.provider == EmbeddingProvider::Fake {
                    return Err(Error::InvalidConfig("embedding.provider = \"fake\" is not allowed in production".into()));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub index: IndexSettings,
    pub chunking: ChunkingSettings,
    pub rag: RagSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Fails with `InvalidConfig` when a required endpoint or credential is
    /// missing or a size parameter is zero.
    pub fn validate(&self) -> Result<()> {
        if self.llm.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("llm.base_url is required".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(Error::InvalidConfig("llm.model is required".into()));
        }
        if self.llm.require_api_key && self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "llm.api_key is required (set APP_LLM__API_KEY, or llm.require_api_key = false for local servers)".into(),
            ));
        }
        if self.embedding.provider == EmbeddingProvider::Remote && self.embedding_base_url().trim().is_empty() {
            return Err(Error::InvalidConfig("embedding.base_url is required for the remote provider".into()));
        }
        if self.rag.retrieve_k == 0 || self.rag.top_k == 0 {
            return Err(Error::InvalidConfig("rag.retrieve_k and rag.top_k must be positive".into()));
        }
        if self.chunking.max_tokens == 0 {
            return Err(Error::InvalidConfig("chunking.max_tokens must be positive".into()));
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        Ok(())
    }

    /// Remote embeddings share the chat endpoint unless overridden.
    pub fn embedding_base_url(&self) -> &str {
        self.embedding.base_url.as_deref().unwrap_or(&self.llm.base_url)
    }

    pub fn embedding_api_key(&self) -> Option<&str> {
        self.embedding.api_key.as_deref().or(self.llm.api_key.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub raw_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { raw_dir: "data/raw".into() }
    }
}

impl DataSettings {
    pub fn raw_dir_path(&self) -> PathBuf {
        expand_path(&self.raw_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub db_path: String,
    pub table: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { db_path: "data/index".into(), table: "docs".into() }
    }
}

impl IndexSettings {
    pub fn db_path(&self) -> PathBuf {
        expand_path(&self.db_path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCounterKind {
    #[default]
    Words,
    Tokenizer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub token_counter: TokenCounterKind,
    /// `tokenizer.json` used when `token_counter = "tokenizer"`; defaults to
    /// the embedding model's tokenizer.
    pub tokenizer_path: Option<String>,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let defaults = ChunkingConfig::default();
        Self {
            max_tokens: defaults.max_tokens,
            overlap_tokens: defaults.overlap_tokens,
            token_counter: TokenCounterKind::Words,
            tokenizer_path: None,
        }
    }
}

impl ChunkingSettings {
    pub fn chunking_config(&self) -> ChunkingConfig {
        ChunkingConfig { max_tokens: self.max_tokens, overlap_tokens: self.overlap_tokens }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankerKind {
    #[default]
    Distance,
    CrossEncoder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub retrieve_k: usize,
    pub top_k: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub inline_citations: bool,
    pub reranker: RerankerKind,
    /// Directory holding `config.json`, `tokenizer.json` and `model.safetensors`
    /// of a sequence-classification cross-encoder.
    pub cross_encoder_dir: Option<String>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            retrieve_k: 8,
            top_k: 5,
            temperature: 0.1,
            max_tokens: 800,
            inline_citations: true,
            reranker: RerankerKind::Distance,
            cross_encoder_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub require_api_key: bool,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            require_api_key: true,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// candle BGE-M3 from a local model directory.
    #[default]
    Local,
    /// OpenAI-compatible `/embeddings` endpoint.
    Remote,
    /// Deterministic hash embeddings, for tests and smoke runs.
    Fake,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model_dir: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub dim: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model_dir: None,
            base_url: None,
            api_key: None,
            model: "text-embedding-3-large".into(),
            dim: 1024,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 8000 }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn loaded(jail: &mut Jail) -> figment::error::Result<Settings> {
        jail.set_env("RUST_ENV", "dev");
        let config = Config::load().map_err(|e| e.to_string())?;
        config.settings().map_err(|e| e.to_string().into())
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        Jail::expect_with(|jail| {
            jail.set_env("APP_LLM__API_KEY", "sk-test");
            let s = loaded(jail)?;
            assert_eq!(s.rag.retrieve_k, 8);
            assert_eq!(s.rag.top_k, 5);
            assert!((s.rag.temperature - 0.1).abs() < f32::EPSILON);
            assert_eq!(s.rag.max_tokens, 800);
            assert!(s.rag.inline_citations);
            assert_eq!(s.chunking.chunking_config(), ChunkingConfig { max_tokens: 400, overlap_tokens: 60 });
            assert_eq!(s.index.table, "docs");
            assert_eq!(s.llm.api_key.as_deref(), Some("sk-test"));
            Ok(())
        });
    }

    #[test]
    fn env_overrides_files_and_dev_file_overrides_base() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [rag]
                top_k = 4
                inline_citations = false

                [llm]
                api_key = "from-file"
                "#,
            )?;
            jail.create_file("config.dev.toml", "[rag]\ntop_k = 3\n")?;
            jail.set_env("APP_RAG__RETRIEVE_K", "12");
            jail.set_env("APP_EMBEDDING__PROVIDER", "fake");
            let s = loaded(jail)?;
            assert_eq!(s.rag.top_k, 3);
            assert_eq!(s.rag.retrieve_k, 12);
            assert!(!s.rag.inline_citations);
            assert_eq!(s.embedding.provider, EmbeddingProvider::Fake);
            Ok(())
        });
    }

    #[test]
    fn missing_credential_is_invalid_config() {
        Jail::expect_with(|jail| {
            jail.set_env("RUST_ENV", "dev");
            let config = Config::load().map_err(|e| e.to_string())?;
            let err = config.settings().expect_err("api key missing");
            assert!(matches!(err, Error::InvalidConfig(_)));

            jail.set_env("APP_LLM__REQUIRE_API_KEY", "false");
            let config = Config::load().map_err(|e| e.to_string())?;
            assert!(config.settings().is_ok());
            Ok(())
        });
    }

    #[test]
    fn fake_embeddings_rejected_in_production() {
        Jail::expect_with(|jail| {
            jail.set_env("RUST_ENV", "prod");
            jail.set_env("APP_LLM__API_KEY", "sk-test");
            jail.set_env("APP_EMBEDDING__PROVIDER", "fake");
            let config = Config::load().map_err(|e| e.to_string())?;
            assert!(matches!(config.settings(), Err(Error::InvalidConfig(_))));
            Ok(())
        });
    }

    #[test]
    fn remote_embeddings_fall_back_to_llm_endpoint() {
        let mut s = Settings::default();
        s.llm.api_key = Some("k".into());
        s.embedding.provider = EmbeddingProvider::Remote;
        assert!(s.validate().is_ok());
        assert_eq!(s.embedding_base_url(), "https://api.openai.com/v1");
        assert_eq!(s.embedding_api_key(), Some("k"));

        s.llm.base_url = String::new();
        assert!(s.validate().is_err());
    }

    #[test]
    fn resolve_with_base_keeps_absolute_paths() {
        let base = Path::new("/srv/docqa");
        assert_eq!(resolve_with_base(base, "data/raw"), PathBuf::from("/srv/docqa/data/raw"));
        assert_eq!(resolve_with_base(base, "/var/idx"), PathBuf::from("/var/idx"));
    }
}
