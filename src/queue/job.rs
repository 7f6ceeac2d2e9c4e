use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of content object a job translates a field of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    ContentItem,
    TaxonomyTerm,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::ContentItem => write!(f, "content_item"),
            ObjectType::TaxonomyTerm => write!(f, "taxonomy_term"),
        }
    }
}

/// Identifies one translatable field of one content object.
///
/// At most one job per key may be active (`Pending`/`Translating`) at a time;
/// the queue enforces this on enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey {
    pub object_type: ObjectType,
    pub object_id: String,
    pub field: String,
}

impl ContentKey {
    pub fn new(object_type: ObjectType, object_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            object_type,
            object_id: object_id.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.object_type, self.object_id, self.field)
    }
}

/// Tracks the lifecycle state of a job.
///
/// `Pending`/`Outdated` are claimable, `Translating` is in flight, and
/// `Done`/`Skipped`/`Error` are terminal. `Error` jobs are not auto-retried;
/// an administrator re-enqueues them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Translating,
    Done,
    Skipped,
    Error,
    Outdated,
}

impl JobState {
    /// Whether a job in this state blocks a new enqueue of the same key.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Pending | JobState::Translating)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Skipped | JobState::Error)
    }

    /// Whether the processor may claim a job in this state.
    pub fn is_claimable(self) -> bool {
        matches!(self, JobState::Pending | JobState::Outdated)
    }

    pub const ALL: [JobState; 6] = [
        JobState::Pending,
        JobState::Translating,
        JobState::Done,
        JobState::Skipped,
        JobState::Error,
        JobState::Outdated,
    ];
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Translating => write!(f, "translating"),
            JobState::Done => write!(f, "done"),
            JobState::Skipped => write!(f, "skipped"),
            JobState::Error => write!(f, "error"),
            JobState::Outdated => write!(f, "outdated"),
        }
    }
}

/// The result the processor reports for one executed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    /// No translatable content (empty source, vanished object). A success
    /// path, distinct from `Done`.
    Skipped,
    Error(String),
}

/// One unit of translation work: a single field of a single object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub key: ContentKey,
    /// Hash of the source text at enqueue time, used for idempotency and
    /// change detection.
    pub content_hash: String,
    pub state: JobState,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Insertion order within the queue; breaks created_at ties on claim.
    #[serde(default)]
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(key: ContentKey, content_hash: impl Into<String>, seq: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            key,
            content_hash: content_hash.into(),
            state: JobState::Pending,
            attempts: 0,
            last_error: None,
            seq,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ContentKey {
        ContentKey::new(ObjectType::ContentItem, "42", "title")
    }

    #[test]
    fn job_creation_defaults() {
        let job = Job::new(key(), "abc123", 7);
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.seq, 7);
        assert!(job.last_error.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn state_classification() {
        assert!(JobState::Pending.is_active());
        assert!(JobState::Translating.is_active());
        assert!(!JobState::Outdated.is_active());

        assert!(JobState::Pending.is_claimable());
        assert!(JobState::Outdated.is_claimable());
        assert!(!JobState::Translating.is_claimable());

        assert!(JobState::Done.is_terminal());
        assert!(JobState::Skipped.is_terminal());
        assert!(JobState::Error.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Outdated.is_terminal());
    }

    #[test]
    fn content_key_display() {
        assert_eq!(key().to_string(), "content_item:42:title");
        let term = ContentKey::new(ObjectType::TaxonomyTerm, "9", "name");
        assert_eq!(term.to_string(), "taxonomy_term:9:name");
    }

    #[test]
    fn job_serialization_roundtrip() {
        let job = Job::new(key(), "hash", 1);
        let json = serde_json::to_string(&job).unwrap();
        let deserialized: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id, job.id);
        assert_eq!(deserialized.key, job.key);
        assert_eq!(deserialized.state, JobState::Pending);
    }

    #[test]
    fn job_state_serializes_snake_case() {
        let json = serde_json::to_string(&JobState::Translating).unwrap();
        assert_eq!(json, "\"translating\"");
    }
}
