use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No translation provider is configured")]
    NoProvider,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Content error: {0}")]
    Content(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
