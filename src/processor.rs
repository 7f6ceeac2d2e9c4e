//! Drives claimed jobs through translation and write-back.
//!
//! One `run_batch` call is one batch: acquire the lock, claim up to N jobs,
//! execute them strictly in claim order, release the lock. A job failure
//! never aborts the batch; storage failures do, with a partial summary lost
//! and the lock still released by the claim guard.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::content::ContentSource;
use crate::error::EngineError;
use crate::lock::BatchLock;
use crate::provider::{TranslateBackend, Translator};
use crate::queue::{Job, JobOutcome, JobQueue};
use crate::versioning::VersionLog;

/// Counters for one batch invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Jobs claimed from the queue. Zero means the lock was held.
    pub claimed: usize,
    /// Jobs translated and committed.
    pub processed: usize,
    /// Jobs with nothing to translate (vanished object, empty source).
    pub skipped: usize,
    /// Jobs that ended in the error state.
    pub errors: usize,
}

/// Executes batches against the wired services. Every collaborator is
/// passed in explicitly; the processor owns no state of its own.
pub struct BatchProcessor<'a, B: TranslateBackend> {
    queue: &'a JobQueue,
    lock: &'a BatchLock,
    translator: &'a Translator<B>,
    content: &'a dyn ContentSource,
    versions: &'a VersionLog,
    config: &'a EngineConfig,
}

impl<'a, B: TranslateBackend> BatchProcessor<'a, B> {
    pub fn new(
        queue: &'a JobQueue,
        lock: &'a BatchLock,
        translator: &'a Translator<B>,
        content: &'a dyn ContentSource,
        versions: &'a VersionLog,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            queue,
            lock,
            translator,
            content,
            versions,
            config,
        }
    }

    /// Run one batch of up to `batch_size` jobs.
    ///
    /// Returns `claimed = 0` without touching the queue when another batch
    /// holds the lock; overlap is backpressure, not an error.
    pub async fn run_batch(&self, batch_size: usize) -> Result<BatchSummary, EngineError> {
        let Some(_claim) = self.lock.try_acquire() else {
            debug!("batch lock held, skipping run");
            return Ok(BatchSummary::default());
        };

        // Fail before claiming so jobs stay pending.
        if !self.translator.is_configured() {
            return Err(EngineError::NoProvider);
        }

        let jobs = self.queue.claim(batch_size)?;
        let mut summary = BatchSummary {
            claimed: jobs.len(),
            ..Default::default()
        };
        let budget = Duration::from_secs(self.config.batch_time_budget_secs);
        let started = Instant::now();

        for job in jobs {
            if started.elapsed() >= budget {
                warn!(job_id = %job.id, "batch time budget exhausted, releasing job");
                self.queue.release(&job.id)?;
                continue;
            }
            match self.process_job(&job).await? {
                JobOutcome::Done => summary.processed += 1,
                JobOutcome::Skipped => summary.skipped += 1,
                JobOutcome::Error(_) => summary.errors += 1,
            }
        }

        info!(
            claimed = summary.claimed,
            processed = summary.processed,
            skipped = summary.skipped,
            errors = summary.errors,
            "batch finished"
        );
        Ok(summary)
    }

    /// Execute one job and record its outcome in the queue. Only storage
    /// failures bubble up; anything job-scoped becomes the outcome.
    async fn process_job(&self, job: &Job) -> Result<JobOutcome, EngineError> {
        let text = match self.content.resolve_source_text(&job.key) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(job_id = %job.id, key = %job.key, "source object gone, skipping");
                return self.finish(job, JobOutcome::Skipped);
            }
            Err(err) => {
                return self.finish(job, JobOutcome::Error(err.to_string()));
            }
        };

        if text.trim().is_empty() {
            return self.finish(job, JobOutcome::Skipped);
        }

        let translated = match self
            .translator
            .translate(
                &text,
                &self.config.source_lang,
                &self.config.target_lang,
                self.config.domain.as_deref(),
            )
            .await
        {
            Ok(translated) => translated,
            Err(err) => {
                return self.finish(job, JobOutcome::Error(err.to_string()));
            }
        };

        let old_value = self.content.previous_value(&job.key);
        if let Err(err) = self.content.write_translated_value(&job.key, &translated) {
            return self.finish(job, JobOutcome::Error(err.to_string()));
        }
        self.versions.append(
            job.key.clone(),
            old_value,
            translated,
            self.translator.slug(),
            "processor",
        );
        self.finish(job, JobOutcome::Done)
    }

    fn finish(&self, job: &Job, outcome: JobOutcome) -> Result<JobOutcome, EngineError> {
        self.queue.complete(&job.id, outcome.clone())?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TranslationCache;
    use crate::content::{MemoryContent, NoGlossary};
    use crate::provider::error::ProviderError;
    use crate::provider::{EchoBackend, RetryPolicy, TranslatorOptions};
    use crate::queue::{ContentKey, JobState, ObjectType};
    use crate::rate_limit::RateLimiter;
    use std::sync::Arc;

    /// Backend that rejects one specific input with a permanent error.
    struct FlakyBackend {
        fail_on: String,
    }

    impl TranslateBackend for FlakyBackend {
        fn slug(&self) -> &str {
            "flaky"
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
            _target: &str,
            _domain: Option<&str>,
        ) -> Result<String, ProviderError> {
            if text == self.fail_on {
                Err(ProviderError::Auth { status: 401 })
            } else {
                Ok(text.to_uppercase())
            }
        }
    }

    /// Backend that claims to be unconfigured.
    struct DeadBackend;

    impl TranslateBackend for DeadBackend {
        fn slug(&self) -> &str {
            "dead"
        }

        fn is_configured(&self) -> bool {
            false
        }

        fn cost_per_1000_chars(&self) -> f64 {
            0.0
        }

        async fn translate_chunk(
            &self,
            _text: &str,
            _source: &str,
            _target: &str,
            _domain: Option<&str>,
        ) -> Result<String, ProviderError> {
            unreachable!("unconfigured backend must never be called")
        }
    }

    /// Content source whose writes always fail.
    struct ReadOnlyContent(MemoryContent);

    impl ContentSource for ReadOnlyContent {
        fn resolve_source_text(&self, key: &ContentKey) -> Result<Option<String>, EngineError> {
            self.0.resolve_source_text(key)
        }

        fn write_translated_value(&self, _key: &ContentKey, _value: &str) -> Result<(), EngineError> {
            Err(EngineError::Content("storage is read-only".into()))
        }
    }

    struct Fixture {
        queue: JobQueue,
        lock: BatchLock,
        content: MemoryContent,
        versions: VersionLog,
        config: EngineConfig,
    }

    fn fixture() -> Fixture {
        Fixture {
            queue: JobQueue::in_memory(),
            lock: BatchLock::new(chrono::Duration::minutes(5)),
            content: MemoryContent::new(),
            versions: VersionLog::new(),
            config: EngineConfig::default(),
        }
    }

    fn translator<B: TranslateBackend>(backend: B) -> Translator<B> {
        Translator::new(
            backend,
            Arc::new(TranslationCache::in_memory(64, Duration::from_secs(3600))),
            Arc::new(RateLimiter::new()),
            Arc::new(NoGlossary),
            TranslatorOptions {
                retry: RetryPolicy {
                    max_attempts: 2,
                    base_delay_ms: 1,
                    max_delay_ms: 2,
                    jitter_ms: 0,
                },
                ..Default::default()
            },
        )
    }

    fn key(id: &str) -> ContentKey {
        ContentKey::new(ObjectType::ContentItem, id, "title")
    }

    #[tokio::test]
    async fn batch_translates_and_commits() {
        let f = fixture();
        let t = translator(EchoBackend);
        f.content.insert(key("1"), "hello world");
        let id = f.queue.enqueue(key("1"), "h1").unwrap();

        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &f.content, &f.versions, &f.config);
        let summary = processor.run_batch(10).await.unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                claimed: 1,
                processed: 1,
                skipped: 0,
                errors: 0
            }
        );
        assert_eq!(f.queue.get(&id).unwrap().state, JobState::Done);
        assert_eq!(
            f.content.translated(&key("1")).as_deref(),
            Some("[pt] hello world")
        );

        let history = f.versions.history(&key("1"));
        assert_eq!(history.len(), 1);
        assert!(history[0].old_value.is_none());
        assert_eq!(history[0].provider, "echo");
        assert_eq!(history[0].actor, "processor");

        // Lock is free again after the batch.
        assert!(!f.lock.is_locked());
    }

    #[tokio::test]
    async fn retranslation_records_old_value() {
        let f = fixture();
        let t = translator(EchoBackend);
        f.content.insert(key("1"), "first text");
        f.queue.enqueue(key("1"), "h1").unwrap();

        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &f.content, &f.versions, &f.config);
        processor.run_batch(10).await.unwrap();

        f.content.insert(key("1"), "second text");
        f.queue.enqueue(key("1"), "h2").unwrap();
        processor.run_batch(10).await.unwrap();

        let history = f.versions.history(&key("1"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].old_value.as_deref(), Some("[pt] first text"));
        assert_eq!(history[1].new_value, "[pt] second text");
    }

    #[tokio::test]
    async fn vanished_object_is_skipped() {
        let f = fixture();
        let t = translator(EchoBackend);
        let id = f.queue.enqueue(key("gone"), "h").unwrap();

        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &f.content, &f.versions, &f.config);
        let summary = processor.run_batch(10).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(f.queue.get(&id).unwrap().state, JobState::Skipped);
        assert!(f.versions.is_empty());
    }

    #[tokio::test]
    async fn empty_source_is_skipped() {
        let f = fixture();
        let t = translator(EchoBackend);
        f.content.insert(key("1"), "   ");
        let id = f.queue.enqueue(key("1"), "h").unwrap();

        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &f.content, &f.versions, &f.config);
        let summary = processor.run_batch(10).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(f.queue.get(&id).unwrap().state, JobState::Skipped);
    }

    #[tokio::test]
    async fn one_bad_job_does_not_abort_the_batch() {
        let f = fixture();
        let t = translator(FlakyBackend {
            fail_on: "three".into(),
        });
        let texts = ["one", "two", "three", "four", "five"];
        let mut bad_id = String::new();
        for (i, text) in texts.iter().enumerate() {
            let k = key(&i.to_string());
            f.content.insert(k.clone(), *text);
            let id = f.queue.enqueue(k, "h").unwrap();
            if *text == "three" {
                bad_id = id;
            }
        }

        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &f.content, &f.versions, &f.config);
        let summary = processor.run_batch(10).await.unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                claimed: 5,
                processed: 4,
                skipped: 0,
                errors: 1
            }
        );

        // Every job reached a terminal state.
        let counts = f.queue.counts_by_state();
        assert_eq!(counts[&JobState::Done], 4);
        assert_eq!(counts[&JobState::Error], 1);
        assert_eq!(counts[&JobState::Translating], 0);

        let bad = f.queue.get(&bad_id).unwrap();
        assert!(bad.last_error.unwrap().contains("authentication"));
    }

    #[tokio::test]
    async fn held_lock_means_no_work() {
        let f = fixture();
        let t = translator(EchoBackend);
        f.content.insert(key("1"), "text");
        f.queue.enqueue(key("1"), "h").unwrap();

        let _held = f.lock.try_acquire().unwrap();
        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &f.content, &f.versions, &f.config);
        let summary = processor.run_batch(10).await.unwrap();

        assert_eq!(summary, BatchSummary::default());
        assert_eq!(f.queue.counts_by_state()[&JobState::Pending], 1);
    }

    #[tokio::test]
    async fn stale_lock_is_reclaimed_by_next_batch() {
        let mut f = fixture();
        f.lock = BatchLock::new(chrono::Duration::milliseconds(10));
        let t = translator(EchoBackend);
        f.content.insert(key("1"), "text");
        f.queue.enqueue(key("1"), "h").unwrap();

        // A holder that never releases.
        std::mem::forget(f.lock.try_acquire().unwrap());
        std::thread::sleep(Duration::from_millis(30));

        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &f.content, &f.versions, &f.config);
        let summary = processor.run_batch(10).await.unwrap();
        assert_eq!(summary.processed, 1);
    }

    #[tokio::test]
    async fn missing_provider_aborts_before_claiming() {
        let f = fixture();
        let t = translator(DeadBackend);
        f.content.insert(key("1"), "text");
        f.queue.enqueue(key("1"), "h").unwrap();

        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &f.content, &f.versions, &f.config);
        let result = processor.run_batch(10).await;

        assert!(matches!(result, Err(EngineError::NoProvider)));
        // Nothing was claimed, and the claim guard released the lock.
        assert_eq!(f.queue.counts_by_state()[&JobState::Pending], 1);
        assert!(!f.lock.is_locked());
    }

    #[tokio::test]
    async fn exhausted_budget_releases_remaining_jobs() {
        let mut f = fixture();
        f.config.batch_time_budget_secs = 0;
        let t = translator(EchoBackend);
        for i in 0..3 {
            let k = key(&i.to_string());
            f.content.insert(k.clone(), "text");
            f.queue.enqueue(k, "h").unwrap();
        }

        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &f.content, &f.versions, &f.config);
        let summary = processor.run_batch(10).await.unwrap();

        assert_eq!(summary.claimed, 3);
        assert_eq!(summary.processed, 0);
        // Everything went back to pending; nothing is stuck translating.
        let counts = f.queue.counts_by_state();
        assert_eq!(counts[&JobState::Pending], 3);
        assert_eq!(counts[&JobState::Translating], 0);
    }

    #[tokio::test]
    async fn failed_write_back_marks_job_error() {
        let f = fixture();
        let t = translator(EchoBackend);
        let content = ReadOnlyContent(MemoryContent::new());
        content.0.insert(key("1"), "text");
        let id = f.queue.enqueue(key("1"), "h").unwrap();

        let processor =
            BatchProcessor::new(&f.queue, &f.lock, &t, &content, &f.versions, &f.config);
        let summary = processor.run_batch(10).await.unwrap();

        assert_eq!(summary.errors, 1);
        let job = f.queue.get(&id).unwrap();
        assert_eq!(job.state, JobState::Error);
        assert!(job.last_error.unwrap().contains("read-only"));
        assert!(f.versions.is_empty());
    }
}
