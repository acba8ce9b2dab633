use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorldlineError {
    #[error("Nation not found: {0}")]
    NationNotFound(String),

    #[error("Invalid target path: {0}")]
    InvalidPath(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Rate limited by provider (suggested retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorldlineError>;
