//! Per-provider request throttling over a fixed window.
//!
//! Advisory and local: it keeps a single running instance under provider
//! quotas, it does not coordinate across processes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Snapshot of one provider's window, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitStatus {
    /// Requests recorded in the current window.
    pub count: u32,
    /// Time until the window resets.
    pub reset_in: Duration,
    /// Whether another request fits under the given ceiling.
    pub available: bool,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Fixed-window request counter keyed by provider slug.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    window: Duration,
}

impl RateLimiter {
    /// Limiter with the standard 60-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(60))
    }

    /// Limiter with a custom window length. Tests use short windows.
    pub fn with_window(window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Whether a request for `key` fits under `max_per_window`.
    pub fn can_make_request(&self, key: &str, max_per_window: u32) -> bool {
        let mut windows = self.lock();
        let window = Self::rolled(&mut windows, key, self.window);
        window.count < max_per_window
    }

    /// Count one outgoing request against `key`'s window.
    pub fn record_request(&self, key: &str) {
        let mut windows = self.lock();
        let window = Self::rolled(&mut windows, key, self.window);
        window.count += 1;
    }

    pub fn status(&self, key: &str, max_per_window: u32) -> RateLimitStatus {
        let mut windows = self.lock();
        let window_len = self.window;
        let window = Self::rolled(&mut windows, key, window_len);
        RateLimitStatus {
            count: window.count,
            reset_in: window_len.saturating_sub(window.started.elapsed()),
            available: window.count < max_per_window,
        }
    }

    /// Drop `key`'s window entirely, starting fresh on the next request.
    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Fetch the live window for `key`, replacing it when expired.
    fn rolled<'a>(
        windows: &'a mut HashMap<String, Window>,
        key: &str,
        window_len: Duration,
    ) -> &'a mut Window {
        let entry = windows.entry(key.to_string()).or_insert_with(|| Window {
            count: 0,
            started: Instant::now(),
        });
        if entry.started.elapsed() >= window_len {
            *entry = Window {
                count: 0,
                started: Instant::now(),
            };
        }
        entry
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Window>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
