use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Index '{0}' not found. Run docqa-indexer to build it first.")]
    IndexNotFound(String),

    #[error("{service} call failed: {message}")]
    ExternalCall { service: &'static str, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn external(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::ExternalCall { service, message: err.to_string() }
    }

    pub fn operation(err: impl std::fmt::Display) -> Self {
        Self::Operation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
