//! Append-only history of translated-value changes.
//!
//! Every committed translation appends one record; records are never
//! mutated, only pruned by retention. The latest record's `old_value` is
//! what a rollback restores.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::queue::ContentKey;

/// One committed change to a translated field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    pub key: ContentKey,
    /// Value before the commit; `None` for a first translation.
    pub old_value: Option<String>,
    pub new_value: String,
    /// Provider slug that produced the value.
    pub provider: String,
    /// Who committed: "processor" for batch runs, otherwise an admin name.
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory append-only version store.
#[derive(Default)]
pub struct VersionLog {
    records: Mutex<Vec<VersionRecord>>,
}

impl VersionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &self,
        key: ContentKey,
        old_value: Option<String>,
        new_value: impl Into<String>,
        provider: impl Into<String>,
        actor: impl Into<String>,
    ) {
        let record = VersionRecord {
            key,
            old_value,
            new_value: new_value.into(),
            provider: provider.into(),
            actor: actor.into(),
            created_at: Utc::now(),
        };
        self.lock().push(record);
    }

    /// All records for a field, oldest first.
    pub fn history(&self, key: &ContentKey) -> Vec<VersionRecord> {
        self.lock()
            .iter()
            .filter(|r| &r.key == key)
            .cloned()
            .collect()
    }

    /// The value a rollback of the latest commit would restore.
    pub fn rollback_value(&self, key: &ContentKey) -> Option<String> {
        self.lock()
            .iter()
            .rev()
            .find(|r| &r.key == key)
            .and_then(|r| r.old_value.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Retention: keep only the `keep_min_per_key` newest records per
    /// field. Returns the number of pruned records.
    pub fn prune(&self, keep_min_per_key: usize) -> usize {
        let mut records = self.lock();

        let mut kept_per_key: HashMap<ContentKey, usize> = HashMap::new();
        let mut keep = vec![false; records.len()];
        // Walk newest to oldest so the newest records win retention.
        for (i, record) in records.iter().enumerate().rev() {
            let kept = kept_per_key.entry(record.key.clone()).or_insert(0);
            if *kept < keep_min_per_key {
                keep[i] = true;
                *kept += 1;
            }
        }

        let before = records.len();
        let mut index = 0;
        records.retain(|_| {
            let keep_this = keep[index];
            index += 1;
            keep_this
        });
        before - records.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<VersionRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}
