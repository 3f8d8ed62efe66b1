//! Core types, collaborator contracts and offline preprocessing for docqa.
//!
//! Configuration uses Figment to merge `config.toml` + `config.<env>.toml` +
//! `APP_*` env vars (`__` separates nested keys). The loader and chunker turn a
//! directory of documents into indexable chunks.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig, WordCounter};
pub use error::{Error, Result};
pub use types::*;
