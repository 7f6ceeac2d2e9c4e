//! The assembled engine: every service wired explicitly, no globals.
//!
//! [`TranslationEngine`] owns the queue, lock, cache, rate limiter and
//! version log, and exposes the surface the content-management layer calls:
//! enqueue, run_batch, counts, cleanup, cost estimation and the
//! administrative lock/cache/rate-limit hooks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheStats, TranslationCache};
use crate::config::EngineConfig;
use crate::content::{ContentSource, Glossary, NoGlossary};
use crate::error::EngineError;
use crate::lock::BatchLock;
use crate::processor::{BatchProcessor, BatchSummary};
use crate::provider::{Provider, TranslateBackend, Translator, TranslatorOptions};
use crate::queue::{ContentKey, Job, JobQueue, JobState, ObjectType};
use crate::rate_limit::{RateLimitStatus, RateLimiter};
use crate::versioning::{VersionLog, VersionRecord};

/// What translating the backlog would cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostEstimate {
    pub characters: usize,
    pub word_count: usize,
    pub estimated_cost: f64,
    pub jobs_scanned: usize,
}

pub struct TranslationEngine<B: TranslateBackend = Provider> {
    config: EngineConfig,
    queue: JobQueue,
    lock: BatchLock,
    cache: Arc<TranslationCache>,
    limiter: Arc<RateLimiter>,
    versions: VersionLog,
    translator: Translator<B>,
    content: Box<dyn ContentSource>,
}

impl TranslationEngine<Provider> {
    /// Wire the engine from configuration, selecting the provider it names.
    pub fn from_config(
        config: EngineConfig,
        content: Box<dyn ContentSource>,
    ) -> Result<Self, EngineError> {
        let backend = Provider::from_config(&config)?;
        Self::with_backend(config, backend, content, Arc::new(NoGlossary))
    }
}

impl<B: TranslateBackend> TranslationEngine<B> {
    /// Wire the engine around an explicit backend and glossary. Tests and
    /// embedders use this to substitute their own implementations.
    pub fn with_backend(
        config: EngineConfig,
        backend: B,
        content: Box<dyn ContentSource>,
        glossary: Arc<dyn Glossary>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let queue = match &config.queue_path {
            Some(path) => JobQueue::open(path)?,
            None => JobQueue::in_memory(),
        };
        let cache_ttl = Duration::from_secs(config.cache_ttl_secs);
        let cache = Arc::new(match &config.cache_path {
            Some(path) => TranslationCache::open(path, config.cache_capacity, cache_ttl)?,
            None => TranslationCache::in_memory(config.cache_capacity, cache_ttl),
        });
        let limiter = Arc::new(RateLimiter::new());
        let translator = Translator::new(
            backend,
            Arc::clone(&cache),
            Arc::clone(&limiter),
            glossary,
            TranslatorOptions::from_config(&config),
        );

        Ok(Self {
            lock: BatchLock::new(chrono::Duration::seconds(config.lock_ttl_secs as i64)),
            queue,
            cache,
            limiter,
            versions: VersionLog::new(),
            translator,
            content,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    // --- surface consumed by the content-management layer ---

    pub fn enqueue(
        &self,
        object_type: ObjectType,
        object_id: &str,
        field: &str,
        content_hash: &str,
    ) -> Result<String, EngineError> {
        self.queue
            .enqueue(ContentKey::new(object_type, object_id, field), content_hash)
    }

    /// Run one batch; see [`BatchProcessor::run_batch`].
    pub async fn run_batch(&self, batch_size: usize) -> Result<BatchSummary, EngineError> {
        let processor = BatchProcessor::new(
            &self.queue,
            &self.lock,
            &self.translator,
            self.content.as_ref(),
            &self.versions,
            &self.config,
        );
        processor.run_batch(batch_size).await
    }

    pub fn queue_counts(&self) -> HashMap<JobState, usize> {
        self.queue.counts_by_state()
    }

    pub fn oldest_job(&self, states: &[JobState]) -> Option<Job> {
        self.queue.oldest(states)
    }

    /// Terminal-state retention; see [`JobQueue::cleanup`].
    pub fn cleanup(
        &self,
        states: &[JobState],
        older_than_days: i64,
        keep_min_per_key: usize,
    ) -> Result<usize, EngineError> {
        self.queue.cleanup(
            states,
            chrono::Duration::days(older_than_days),
            keep_min_per_key,
        )
    }

    /// Sweep orphaned `Translating` jobs back to `Pending`.
    pub fn requeue_stuck(&self, older_than_minutes: i64) -> Result<usize, EngineError> {
        self.queue
            .requeue_stuck(chrono::Duration::minutes(older_than_minutes))
    }

    /// Administrative retry of every terminal `Error` job.
    pub fn re_enqueue_errors(&self) -> Result<usize, EngineError> {
        self.queue.re_enqueue_errors()
    }

    /// Scan the backlog and estimate provider cost for translating it.
    pub fn estimate_queue_cost(
        &self,
        states: Option<&[JobState]>,
        max_jobs: usize,
    ) -> Result<CostEstimate, EngineError> {
        const CLAIMABLE: [JobState; 2] = [JobState::Pending, JobState::Outdated];
        let jobs = self
            .queue
            .jobs_in_states(states.unwrap_or(&CLAIMABLE), max_jobs);

        let mut estimate = CostEstimate {
            jobs_scanned: jobs.len(),
            ..Default::default()
        };
        for job in &jobs {
            if let Some(text) = self.content.resolve_source_text(&job.key)? {
                estimate.characters += text.chars().count();
                estimate.word_count += text.split_whitespace().count();
                estimate.estimated_cost += self.translator.estimate_cost(&text);
            }
        }
        Ok(estimate)
    }

    // --- lifecycle / diagnostic hooks ---

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Manually take the batch lock, e.g. to pause processing during a
    /// migration. Held until [`release_lock`](Self::release_lock) or TTL
    /// expiry.
    pub fn acquire_lock(&self) -> bool {
        match self.lock.try_acquire() {
            Some(claim) => {
                std::mem::forget(claim);
                true
            }
            None => false,
        }
    }

    pub fn release_lock(&self) {
        self.lock.force_release();
    }

    pub fn rate_limit_status(&self, provider: &str) -> RateLimitStatus {
        self.limiter
            .status(provider, self.config.rate_limit_per_window)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self, provider: Option<&str>) -> Result<(), EngineError> {
        self.cache.clear(provider)
    }

    pub fn version_history(&self, key: &ContentKey) -> Vec<VersionRecord> {
        self.versions.history(key)
    }

    pub fn prune_versions(&self, keep_min_per_key: usize) -> usize {
        self.versions.prune(keep_min_per_key)
    }
}
