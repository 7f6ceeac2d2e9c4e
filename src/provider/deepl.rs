//! DeepL backend.
//!
//! Classification is fully structured: DeepL signals quota exhaustion with
//! its dedicated HTTP 456 status, so no response-body sniffing is needed to
//! tell "out of credits" apart from "slow down".

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::TranslateBackend;
use super::error::ProviderError;

const API_URL: &str = "https://api.deepl.com/v2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// HTTP 456 is DeepL's "quota exceeded" status.
const STATUS_QUOTA_EXCEEDED: u16 = 456;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: [&'a str; 1],
    source_lang: String,
    target_lang: String,
    /// Extra context to steer tone; not translated itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

pub struct DeepLBackend {
    api_key: String,
    client: Client,
    base_url: String,
    cost_per_1000: f64,
}

impl DeepLBackend {
    pub fn new(api_key: String, cost_per_1000: f64) -> Self {
        Self::with_base_url(api_key, API_URL.to_string(), cost_per_1000)
    }

    /// Create a backend pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: String, base_url: String, cost_per_1000: f64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_key,
            client,
            base_url,
            cost_per_1000,
        }
    }
}

impl TranslateBackend for DeepLBackend {
    fn slug(&self) -> &str {
        "deepl"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn cost_per_1000_chars(&self) -> f64 {
        self.cost_per_1000
    }

    async fn translate_chunk(
        &self,
        text: &str,
        source: &str,
        target: &str,
        domain: Option<&str>,
    ) -> Result<String, ProviderError> {
        let req = TranslateRequest {
            text: [text],
            source_lang: source.to_uppercase(),
            target_lang: target.to_uppercase(),
            context: domain,
        };

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&req)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == STATUS_QUOTA_EXCEEDED {
            return Err(ProviderError::QuotaExceeded);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            });
        }
        if status.is_server_error() {
            return Err(ProviderError::Server {
                status: status.as_u16(),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::InvalidRequest {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: TranslateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Unexpected(format!("malformed DeepL response: {e}")))?;

        match parsed.translations.into_iter().next() {
            Some(t) if !t.text.is_empty() => Ok(t.text),
            _ => Err(ProviderError::EmptyResponse),
        }
    }
}
