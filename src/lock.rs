//! Batch mutual exclusion.
//!
//! A timestamped lock with a TTL serializes processor runs: an invocation
//! that cannot acquire it backs off immediately, and a holder that crashed
//! without releasing is reclaimed once the TTL elapses. Availability over
//! strict exclusion: a short double-hold window after a crash is accepted
//! in exchange for self-healing.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Holder {
    held_at: DateTime<Utc>,
    token: u64,
}

/// The mutex preventing overlapping batches.
pub struct BatchLock {
    state: Mutex<Option<Holder>>,
    ttl: Duration,
    next_token: AtomicU64,
}

/// Proof of acquisition. Releases the lock when dropped, so the lock is
/// freed on every exit path, early returns and unwinding included.
pub struct LockClaim<'a> {
    lock: &'a BatchLock,
    token: u64,
}

impl BatchLock {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(None),
            ttl,
            next_token: AtomicU64::new(1),
        }
    }

    /// Check-and-set in a single atomic step: succeeds when the lock is
    /// free or the current holder's TTL has elapsed.
    pub fn try_acquire(&self) -> Option<LockClaim<'_>> {
        let mut state = self.lock_state();
        if let Some(holder) = *state {
            if Utc::now() - holder.held_at < self.ttl {
                return None;
            }
            warn!(held_since = %holder.held_at, "reclaiming stale batch lock");
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        *state = Some(Holder {
            held_at: Utc::now(),
            token,
        });
        Some(LockClaim { lock: self, token })
    }

    pub fn is_locked(&self) -> bool {
        let state = self.lock_state();
        match *state {
            Some(holder) => Utc::now() - holder.held_at < self.ttl,
            None => false,
        }
    }

    /// When the current holder acquired the lock, for diagnostics.
    pub fn held_since(&self) -> Option<DateTime<Utc>> {
        self.lock_state().map(|h| h.held_at)
    }

    /// Administrative override: drop the lock regardless of holder.
    pub fn force_release(&self) {
        *self.lock_state() = None;
    }

    fn release_token(&self, token: u64) {
        let mut state = self.lock_state();
        // Only the current holder may release; a stale claim dropped after
        // its lock was reclaimed must not free the new holder's lock.
        if state.is_some_and(|h| h.token == token) {
            *state = None;
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<Holder>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for LockClaim<'_> {
    fn drop(&mut self) {
        self.lock.release_token(self.token);
    }
}
