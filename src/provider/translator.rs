//! The shared translation pipeline, implemented once for every backend.
//!
//! Order of operations: empty-input short circuit, cache lookup, glossary
//! pre hook, chunking, per-chunk rate-limit check and bounded retry with
//! jittered exponential backoff, glossary post hook, cache write.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::TranslateBackend;
use super::chunk::split_chunks;
use super::error::ProviderError;
use crate::cache::TranslationCache;
use crate::config::EngineConfig;
use crate::content::Glossary;
use crate::rate_limit::RateLimiter;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt ceiling per chunk, first try included.
    pub max_attempts: u32,
    /// Base delay in milliseconds; attempt n waits `base * 2^(n-1)`.
    pub base_delay_ms: u64,
    /// Cap applied to the exponential delay.
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter added to every delay, to avoid
    /// thundering-herd retries. Zeroed in tests.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Calculate the backoff for a given attempt: `base * 2^(attempt - 1)`,
    /// capped at `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }

    fn jittered(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..self.jitter_ms)
        };
        self.delay_for_attempt(attempt) + Duration::from_millis(jitter)
    }
}

/// Knobs shared by every backend.
#[derive(Debug, Clone)]
pub struct TranslatorOptions {
    pub retry: RetryPolicy,
    pub max_chunk_chars: usize,
    pub max_requests_per_window: u32,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_chunk_chars: 4000,
            max_requests_per_window: 60,
        }
    }
}

impl TranslatorOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                base_delay_ms: config.base_delay_ms,
                max_delay_ms: config.max_delay_ms,
                ..Default::default()
            },
            max_chunk_chars: config.max_chunk_chars,
            max_requests_per_window: config.rate_limit_per_window,
        }
    }
}

/// A backend wrapped with the shared pipeline.
pub struct Translator<B> {
    backend: B,
    cache: Arc<TranslationCache>,
    limiter: Arc<RateLimiter>,
    glossary: Arc<dyn Glossary>,
    options: TranslatorOptions,
}

impl<B: TranslateBackend> Translator<B> {
    pub fn new(
        backend: B,
        cache: Arc<TranslationCache>,
        limiter: Arc<RateLimiter>,
        glossary: Arc<dyn Glossary>,
        options: TranslatorOptions,
    ) -> Self {
        Self {
            backend,
            cache,
            limiter,
            glossary,
            options,
        }
    }

    pub fn slug(&self) -> &str {
        self.backend.slug()
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_configured()
    }

    /// `(character_count / 1000) * rate`; zero when no rate is configured.
    pub fn estimate_cost(&self, text: &str) -> f64 {
        let rate = self.backend.cost_per_1000_chars();
        if rate == 0.0 {
            return 0.0;
        }
        (text.chars().count() as f64 / 1000.0) * rate
    }

    /// Translate `text`, going to the network only on a cache miss.
    pub async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        domain: Option<&str>,
    ) -> Result<String, ProviderError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        if !self.backend.is_configured() {
            return Err(ProviderError::MissingConfiguration);
        }

        if let Some(hit) = self.cache.get(text, self.slug(), source, target) {
            debug!(provider = self.slug(), "cache hit");
            return Ok(hit);
        }

        let prepared = self.glossary.apply_pre(text, source, target, domain);
        let chunks = split_chunks(&prepared, self.options.max_chunk_chars);
        debug!(provider = self.slug(), chunks = chunks.len(), "translating");

        let mut translated = String::new();
        for chunk in &chunks {
            if chunk.trim().is_empty() {
                // Pure separator chunks pass through unchanged.
                translated.push_str(chunk);
                continue;
            }
            translated.push_str(&self.translate_with_retry(chunk, source, target, domain).await?);
        }

        let result = self.glossary.apply_post(&translated, source, target, domain);

        if let Err(err) = self
            .cache
            .set(text, self.slug(), &result, source, target, None)
        {
            warn!(provider = self.slug(), error = %err, "failed to write translation cache");
        }
        Ok(result)
    }

    /// One chunk through the rate limiter and the bounded retry loop.
    async fn translate_with_retry(
        &self,
        chunk: &str,
        source: &str,
        target: &str,
        domain: Option<&str>,
    ) -> Result<String, ProviderError> {
        let slug = self.backend.slug().to_string();
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let result = if !self
                .limiter
                .can_make_request(&slug, self.options.max_requests_per_window)
            {
                let status = self
                    .limiter
                    .status(&slug, self.options.max_requests_per_window);
                Err(ProviderError::RateLimited {
                    retry_after_ms: status.reset_in.as_millis() as u64,
                })
            } else {
                self.limiter.record_request(&slug);
                self.backend
                    .translate_chunk(chunk, source, target, domain)
                    .await
            };

            match result {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt < self.options.retry.max_attempts => {
                    let mut delay = self.options.retry.jittered(attempt);
                    if let ProviderError::RateLimited { retry_after_ms } = &err {
                        let hinted =
                            Duration::from_millis((*retry_after_ms).min(self.options.retry.max_delay_ms));
                        delay = delay.max(hinted);
                    }
                    warn!(
                        provider = %slug,
                        attempt,
                        max = self.options.retry.max_attempts,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "transient provider failure, backing off"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
