//! Pluggable translation backends and the shared translation pipeline.
//!
//! [`TranslateBackend`] is the seam: one raw provider call, no caching, no
//! chunking, no retries. [`Translator`] wraps any backend with the shared
//! pipeline. [`Provider`] is the closed set of configured backends — one
//! variant per concrete provider, selected by explicit configuration.

pub mod chunk;
mod deepl;
mod echo;
pub mod error;
mod libre;
mod translator;

pub use deepl::DeepLBackend;
pub use echo::EchoBackend;
pub use error::ProviderError;
pub use libre::LibreBackend;
pub use translator::{RetryPolicy, Translator, TranslatorOptions};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// One raw translation call against an external provider.
pub trait TranslateBackend {
    /// Stable identifier used for cache keys and rate-limit windows.
    fn slug(&self) -> &str;

    /// Whether the backend has the credentials/endpoint it needs.
    fn is_configured(&self) -> bool;

    /// Configured cost per 1000 source characters; zero when unknown.
    fn cost_per_1000_chars(&self) -> f64;

    /// Translate one chunk. Implementations classify failures into
    /// [`ProviderError`] but do not retry; the [`Translator`] owns retries.
    async fn translate_chunk(
        &self,
        text: &str,
        source: &str,
        target: &str,
        domain: Option<&str>,
    ) -> Result<String, ProviderError>;
}

/// The configured provider set.
pub enum Provider {
    DeepL(DeepLBackend),
    Libre(LibreBackend),
    Echo(EchoBackend),
}

impl Provider {
    /// Build the provider named by the configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        match config.provider.as_str() {
            "deepl" => Ok(Provider::DeepL(DeepLBackend::with_base_url(
                config.deepl_api_key.clone(),
                config.deepl_base_url.clone(),
                config.deepl_cost_per_1000,
            ))),
            "libretranslate" => Ok(Provider::Libre(LibreBackend::with_base_url(
                config.libre_api_key.clone(),
                config.libre_base_url.clone(),
                config.libre_cost_per_1000,
            ))),
            "echo" => Ok(Provider::Echo(EchoBackend)),
            other => Err(EngineError::Config(format!("unknown provider \"{other}\""))),
        }
    }
}

impl TranslateBackend for Provider {
    fn slug(&self) -> &str {
        match self {
            Provider::DeepL(b) => b.slug(),
            Provider::Libre(b) => b.slug(),
            Provider::Echo(b) => b.slug(),
        }
    }

    fn is_configured(&self) -> bool {
        match self {
            Provider::DeepL(b) => b.is_configured(),
            Provider::Libre(b) => b.is_configured(),
            Provider::Echo(b) => b.is_configured(),
        }
    }

    fn cost_per_1000_chars(&self) -> f64 {
        match self {
            Provider::DeepL(b) => b.cost_per_1000_chars(),
            Provider::Libre(b) => b.cost_per_1000_chars(),
            Provider::Echo(b) => b.cost_per_1000_chars(),
        }
    }

    async fn translate_chunk(
        &self,
        text: &str,
        source: &str,
        target: &str,
        domain: Option<&str>,
    ) -> Result<String, ProviderError> {
        match self {
            Provider::DeepL(b) => b.translate_chunk(text, source, target, domain).await,
            Provider::Libre(b) => b.translate_chunk(text, source, target, domain).await,
            Provider::Echo(b) => b.translate_chunk(text, source, target, domain).await,
        }
    }
}
