//! Pseudo-provider for demos and wiring tests.
//!
//! Marks text with the target language instead of calling any API. Always
//! configured, never fails, costs nothing.

use super::TranslateBackend;
use super::error::ProviderError;

pub struct EchoBackend;

impl TranslateBackend for EchoBackend {
    fn slug(&self) -> &str {
        "echo"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn cost_per_1000_chars(&self) -> f64 {
        0.0
    }

    async fn translate_chunk(
        &self,
        text: &str,
        _source: &str,
        target: &str,
        _domain: Option<&str>,
    ) -> Result<String, ProviderError> {
        Ok(format!("[{target}] {text}"))
    }
}
