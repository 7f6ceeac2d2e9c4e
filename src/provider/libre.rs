//! LibreTranslate backend.
//!
//! LibreTranslate has no structured quota status: a 429 covers both "slow
//! down" and "no credits left". The error body is inspected for credit or
//! quota wording as a last resort so that exhausted accounts become a
//! permanent failure instead of a retry loop.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::TranslateBackend;
use super::error::ProviderError;

const API_URL: &str = "https://libretranslate.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

pub struct LibreBackend {
    api_key: String,
    client: Client,
    base_url: String,
    cost_per_1000: f64,
}

impl LibreBackend {
    pub fn new(api_key: String, cost_per_1000: f64) -> Self {
        Self::with_base_url(api_key, API_URL.to_string(), cost_per_1000)
    }

    /// Create a backend pointing at a custom base URL (self-hosted
    /// instances, tests).
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

/// Whether a 429 body names credit/quota exhaustion rather than pacing.
fn body_indicates_quota(body: &str) -> bool {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_else(|| body.to_string())
        .to_lowercase();
    ["quota", "credit", "insufficient", "balance"]
        .iter()
        .any(|needle| message.contains(needle))
}

impl TranslateBackend for LibreBackend {
    fn slug(&self) -> &str {
        "libretranslate"
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    fn cost_per_1000_chars(&self) -> f64 {
        self.cost_per_1000
    }

    async fn translate_chunk(
        &self,
        text: &str,
        source: &str,
        target: &str,
        _domain: Option<&str>,
    ) -> Result<String, ProviderError> {
        let req = TranslateRequest {
            q: text,
            source,
            target,
            format: "text",
            api_key: (!self.api_key.is_empty()).then_some(self.api_key.as_str()),
        };

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&req)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            let body = response.text().await.unwrap_or_default();
            if body_indicates_quota(&body) {
                return Err(ProviderError::QuotaExceeded);
            }
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
        let parsed: TranslateResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::Unexpected(format!("malformed LibreTranslate response: {e}"))
        })?;

        if parsed.translated_text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(parsed.translated_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> LibreBackend {
        LibreBackend::with_base_url("lt-test".into(), server.uri(), 0.0)
    }

    async fn mount(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn successful_translation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_partial_json(serde_json::json!({
                "q": "good morning",
                "source": "en",
                "target": "pt",
                "api_key": "lt-test"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "translatedText": "bom dia"
            })))
            .mount(&server)
            .await;

        let result = backend(&server)
            .translate_chunk("good morning", "en", "pt", None)
            .await
            .unwrap();
        assert_eq!(result, "bom dia");
    }

    #[tokio::test]
    async fn plain_429_is_rate_limited() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(429)
                .set_body_json(serde_json::json!({"error": "Slowdown: too many requests"})),
        )
        .await;

        let err = backend(&server)
            .translate_chunk("x", "en", "pt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn quota_429_is_permanent() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(429).set_body_json(
                serde_json::json!({"error": "Insufficient credit for this request"}),
            ),
        )
        .await;

        let err = backend(&server)
            .translate_chunk("x", "en", "pt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::QuotaExceeded));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn status_403_is_auth_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(403).set_body_json(serde_json::json!({"error": "Invalid API key"})),
        )
        .await;

        let err = backend(&server)
            .translate_chunk("x", "en", "pt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth { status: 403 }));
    }

    #[tokio::test]
    async fn status_400_is_invalid_request() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(400).set_body_string("bad language pair")).await;

        let err = backend(&server)
            .translate_chunk("x", "en", "xx", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest { status: 400, .. }));
    }

    #[tokio::test]
    async fn status_500_is_server_error() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(500)).await;

        let err = backend(&server)
            .translate_chunk("x", "en", "pt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Server { status: 500 }));
    }

    #[tokio::test]
    async fn empty_translated_text_is_empty_response() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"translatedText": ""})),
        )
        .await;

        let err = backend(&server)
            .translate_chunk("x", "en", "pt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    // --- body_indicates_quota tests ---

    #[test]
    fn quota_wording_detected() {
        assert!(body_indicates_quota(r#"{"error": "Monthly quota exceeded"}"#));
        assert!(body_indicates_quota(r#"{"error": "Insufficient credit"}"#));
        assert!(body_indicates_quota("account balance too low"));
    }

    #[test]
    fn pacing_wording_not_quota() {
        assert!(!body_indicates_quota(r#"{"error": "Slowdown"}"#));
        assert!(!body_indicates_quota("too many requests"));
        assert!(!body_indicates_quota(""));
    }
}
