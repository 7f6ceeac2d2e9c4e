//! Content-addressed cache of provider outputs.
//!
//! Two tiers: a bounded LRU checked first, backed by a persistent map that
//! survives restarts; a persistent hit repopulates the LRU. Keys are a
//! `blake3` hash of text, provider slug and language pair, so identical
//! translations are never paid for twice.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    provider: String,
    value: String,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Hit/miss counters exposed to diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Two-tier translation cache.
pub struct TranslationCache {
    lru: Mutex<LruCache<String, CacheEntry>>,
    persistent: Mutex<HashMap<String, CacheEntry>>,
    path: Option<PathBuf>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TranslationCache {
    /// Cache held only in memory (both tiers dropped on exit).
    pub fn in_memory(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            lru: Mutex::new(LruCache::new(Self::cap(capacity))),
            persistent: Mutex::new(HashMap::new()),
            path: None,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache whose persistent tier is backed by a JSON file. Expired
    /// entries are dropped at load time.
    pub fn open(
        path: impl AsRef<Path>,
        capacity: usize,
        default_ttl: Duration,
    ) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        let mut persistent: HashMap<String, CacheEntry> = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            HashMap::new()
        };
        persistent.retain(|_, entry| !entry.is_expired());

        Ok(Self {
            lru: Mutex::new(LruCache::new(Self::cap(capacity))),
            persistent: Mutex::new(persistent),
            path: Some(path),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Look up a previous translation of `text` by `provider` for the
    /// given language pair.
    pub fn get(&self, text: &str, provider: &str, source: &str, target: &str) -> Option<String> {
        let key = Self::cache_key(text, provider, source, target);

        {
            let mut lru = self.lock_lru();
            match lru.get(&key) {
                Some(entry) if !entry.is_expired() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {
                    lru.pop(&key);
                }
                None => {}
            }
        }

        // Drop the persistent guard before touching the LRU; `clear` takes
        // the locks in the opposite order.
        let promoted = {
            let mut persistent = self.lock_persistent();
            match persistent.get(&key) {
                Some(entry) if !entry.is_expired() => Some(entry.clone()),
                Some(_) => {
                    persistent.remove(&key);
                    None
                }
                None => None,
            }
        };

        match promoted {
            Some(entry) => {
                self.lock_lru().put(key, entry.clone());
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a translation in both tiers. `ttl` of `None` uses the default.
    pub fn set(
        &self,
        text: &str,
        provider: &str,
        value: &str,
        source: &str,
        target: &str,
        ttl: Option<Duration>,
    ) -> Result<(), EngineError> {
        let key = Self::cache_key(text, provider, source, target);
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            provider: provider.to_string(),
            value: value.to_string(),
            expires_at: Utc::now()
                + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24)),
        };

        self.lock_lru().put(key.clone(), entry.clone());
        let mut persistent = self.lock_persistent();
        persistent.insert(key, entry);
        debug!(provider, "translation cached");
        self.save(&persistent)
    }

    /// Evict entries. With a provider slug only that provider's entries are
    /// dropped from both tiers; with `None` everything goes.
    pub fn clear(&self, provider: Option<&str>) -> Result<(), EngineError> {
        let mut lru = self.lock_lru();
        let mut persistent = self.lock_persistent();
        match provider {
            None => {
                lru.clear();
                persistent.clear();
            }
            Some(slug) => {
                let doomed: Vec<String> = lru
                    .iter()
                    .filter(|(_, e)| e.provider == slug)
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in doomed {
                    lru.pop(&key);
                }
                persistent.retain(|_, e| e.provider != slug);
            }
        }
        self.save(&persistent)
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    fn cache_key(text: &str, provider: &str, source: &str, target: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        hasher.update(provider.as_bytes());
        hasher.update(source.as_bytes());
        hasher.update(target.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    fn cap(capacity: usize) -> NonZeroUsize {
        NonZeroUsize::new(capacity).unwrap_or_else(|| NonZeroUsize::new(1024).unwrap())
    }

    fn save(&self, persistent: &HashMap<String, CacheEntry>) -> Result<(), EngineError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string(persistent)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn lock_lru(&self) -> std::sync::MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.lru.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_persistent(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.persistent.lock().unwrap_or_else(|e| e.into_inner())
    }
}
