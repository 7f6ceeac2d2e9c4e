//! Durable job store and state machine.
//!
//! The queue is a pure data layer: it knows nothing about providers. All
//! mutations happen under a single mutex guard and are persisted as one
//! snapshot, so a crash can never leave a half-applied transition behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::job::{ContentKey, Job, JobOutcome, JobState};
use crate::error::EngineError;

/// On-disk shape of the queue. The format is internal, not a compatibility
/// surface.
#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueSnapshot {
    jobs: Vec<Job>,
    next_seq: u64,
}

struct Inner {
    jobs: Vec<Job>,
    next_seq: u64,
}

/// Durable store of translation jobs.
///
/// Safe to share between the processor and diagnostic readers; every
/// operation is atomic with respect to the others.
pub struct JobQueue {
    inner: Mutex<Inner>,
    path: Option<PathBuf>,
}

impl JobQueue {
    /// Open a queue backed by a JSON file, creating it empty if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str::<QueueSnapshot>(&contents)?
        } else {
            QueueSnapshot::default()
        };
        Ok(Self {
            inner: Mutex::new(Inner {
                jobs: snapshot.jobs,
                next_seq: snapshot.next_seq,
            }),
            path: Some(path),
        })
    }

    /// Queue held only in memory. Used by tests and embedders that own
    /// their own persistence.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: Vec::new(),
                next_seq: 0,
            }),
            path: None,
        }
    }

    /// Enqueue work for one content field.
    ///
    /// If an active job for the same key exists with the same hash, returns
    /// its id unchanged. If the hash differs, the existing job is marked
    /// `Outdated` and a fresh `Pending` job is created.
    pub fn enqueue(
        &self,
        key: ContentKey,
        content_hash: &str,
    ) -> Result<String, EngineError> {
        let mut inner = self.lock();

        if let Some(existing) = inner
            .jobs
            .iter_mut()
            .find(|j| j.key == key && j.state.is_active())
        {
            if existing.content_hash == content_hash {
                debug!(job_id = %existing.id, key = %key, "enqueue no-op, hash unchanged");
                return Ok(existing.id.clone());
            }
            existing.state = JobState::Outdated;
            existing.updated_at = Utc::now();
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let job = Job::new(key, content_hash, seq);
        let id = job.id.clone();
        debug!(job_id = %id, "job enqueued");
        inner.jobs.push(job);
        self.persist(&inner)?;
        Ok(id)
    }

    /// Atomically select up to `limit` claimable jobs (oldest first) and
    /// transition them to `Translating`.
    pub fn claim(&self, limit: usize) -> Result<Vec<Job>, EngineError> {
        let mut inner = self.lock();

        let mut order: Vec<usize> = inner
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.state.is_claimable())
            .map(|(i, _)| i)
            .collect();
        order.sort_by_key(|&i| (inner.jobs[i].created_at, inner.jobs[i].seq));
        order.truncate(limit);

        let now = Utc::now();
        let mut claimed = Vec::with_capacity(order.len());
        for i in order {
            let job = &mut inner.jobs[i];
            job.state = JobState::Translating;
            job.updated_at = now;
            claimed.push(job.clone());
        }
        if !claimed.is_empty() {
            debug!(count = claimed.len(), "jobs claimed");
            self.persist(&inner)?;
        }
        Ok(claimed)
    }

    /// Record the outcome of one executed job.
    pub fn complete(&self, job_id: &str, outcome: JobOutcome) -> Result<(), EngineError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))?;

        match outcome {
            JobOutcome::Done => {
                job.state = JobState::Done;
                job.last_error = None;
            }
            JobOutcome::Skipped => {
                job.state = JobState::Skipped;
                job.last_error = None;
            }
            JobOutcome::Error(message) => {
                job.state = JobState::Error;
                job.attempts += 1;
                warn!(job_id = %job.id, key = %job.key, error = %message, "job failed");
                job.last_error = Some(message);
            }
        }
        job.updated_at = Utc::now();
        self.persist(&inner)
    }

    /// Return a claimed job to `Pending` without recording an attempt.
    /// Used when the batch time budget expires before the job is reached.
    pub fn release(&self, job_id: &str) -> Result<(), EngineError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.state == JobState::Translating)
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))?;
        job.state = JobState::Pending;
        job.updated_at = Utc::now();
        self.persist(&inner)
    }

    /// Requeue `Translating` jobs untouched for longer than `older_than`.
    /// Recovers orphans left by a processor that crashed mid-batch.
    pub fn requeue_stuck(&self, older_than: Duration) -> Result<usize, EngineError> {
        let mut inner = self.lock();
        let cutoff = Utc::now() - older_than;
        let mut requeued = 0;
        for job in inner
            .jobs
            .iter_mut()
            .filter(|j| j.state == JobState::Translating && j.updated_at <= cutoff)
        {
            job.state = JobState::Pending;
            job.updated_at = Utc::now();
            requeued += 1;
        }
        if requeued > 0 {
            warn!(count = requeued, "requeued stuck translating jobs");
            self.persist(&inner)?;
        }
        Ok(requeued)
    }

    /// Create fresh `Pending` jobs for every terminal `Error` job whose key
    /// has no active job. The error jobs stay in place as history.
    pub fn re_enqueue_errors(&self) -> Result<usize, EngineError> {
        let keys: Vec<(ContentKey, String)> = {
            let inner = self.lock();
            inner
                .jobs
                .iter()
                .filter(|j| j.state == JobState::Error)
                .filter(|j| {
                    !inner
                        .jobs
                        .iter()
                        .any(|other| other.key == j.key && other.state.is_active())
                })
                .map(|j| (j.key.clone(), j.content_hash.clone()))
                .collect()
        };
        let mut count = 0;
        for (key, hash) in keys {
            self.enqueue(key, &hash)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.lock().jobs.iter().find(|j| j.id == job_id).cloned()
    }

    /// Job counts per state. States with no jobs are reported as zero.
    pub fn counts_by_state(&self) -> HashMap<JobState, usize> {
        let inner = self.lock();
        let mut counts: HashMap<JobState, usize> =
            JobState::ALL.iter().map(|&s| (s, 0)).collect();
        for job in &inner.jobs {
            *counts.entry(job.state).or_insert(0) += 1;
        }
        counts
    }

    /// The oldest job currently in one of the given states.
    pub fn oldest(&self, states: &[JobState]) -> Option<Job> {
        let inner = self.lock();
        inner
            .jobs
            .iter()
            .filter(|j| states.contains(&j.state))
            .min_by_key(|j| (j.created_at, j.seq))
            .cloned()
    }

    /// Jobs in the given states, oldest first, capped at `limit`.
    pub fn jobs_in_states(&self, states: &[JobState], limit: usize) -> Vec<Job> {
        let inner = self.lock();
        let mut jobs: Vec<Job> = inner
            .jobs
            .iter()
            .filter(|j| states.contains(&j.state))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| (j.created_at, j.seq));
        jobs.truncate(limit);
        jobs
    }

    /// Delete jobs in the given states older than `older_than`, always
    /// keeping the `keep_min_per_key` most recent matching jobs per key.
    /// Returns the number of deleted jobs.
    pub fn cleanup(
        &self,
        states: &[JobState],
        older_than: Duration,
        keep_min_per_key: usize,
    ) -> Result<usize, EngineError> {
        let mut inner = self.lock();
        let cutoff = Utc::now() - older_than;

        let mut by_key: HashMap<ContentKey, Vec<(usize, chrono::DateTime<Utc>)>> = HashMap::new();
        for (i, job) in inner.jobs.iter().enumerate() {
            if states.contains(&job.state) {
                by_key
                    .entry(job.key.clone())
                    .or_default()
                    .push((i, job.updated_at));
            }
        }

        let mut doomed: Vec<usize> = Vec::new();
        for entries in by_key.values_mut() {
            // Newest first; the head of the list is always retained.
            entries.sort_by(|a, b| b.1.cmp(&a.1));
            for &(i, updated_at) in entries.iter().skip(keep_min_per_key) {
                if updated_at <= cutoff {
                    doomed.push(i);
                }
            }
        }

        let deleted = doomed.len();
        if deleted > 0 {
            doomed.sort_unstable_by(|a, b| b.cmp(a));
            for i in doomed {
                inner.jobs.swap_remove(i);
            }
            debug!(count = deleted, "cleanup deleted terminal jobs");
            self.persist(&inner)?;
        }
        Ok(deleted)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex means a panic mid-mutation; the snapshot on disk
        // is still the last consistent one, so continuing is safe.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, inner: &Inner) -> Result<(), EngineError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = QueueSnapshot {
            jobs: inner.jobs.clone(),
            next_seq: inner.next_seq,
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
