//! Per-caller rate limiting for the chat endpoints.
//!
//! Each caller key (normally the client IP) gets an independent budget of
//! `max_requests` per fixed window of `window_ms`. The window opens on the
//! caller's first request and the count resets once it has elapsed, so no
//! caller is ever admitted more than `max_requests` times inside one window.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::core::config::RateLimitConfig;
use crate::core::error::AppError;

/// Request count for one caller in its current window.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    started: Instant,
    count: u32,
}

/// Rate limiter keyed by caller identity.
pub struct RateLimiter {
    /// Map of caller key -> current window
    windows: DashMap<String, WindowState>,
    window: Duration,
    max_requests: u32,
    retry_after_secs: u64,
    trust_proxy: bool,
}

impl RateLimiter {
    /// Create a limiter for the given window configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            window: Duration::from_millis(config.window_ms.max(1)),
            max_requests: config.max_requests.max(1),
            retry_after_secs: config.retry_after_secs(),
            trust_proxy: config.trust_proxy,
        }
    }

    /// Check if a request is allowed for the given caller key.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the request is allowed
    /// * `Err(AppError::RateLimitExceeded)` if the caller has used up its window
    pub fn check_rate_limit(&self, key: &str) -> Result<(), AppError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), AppError> {
        // The entry guard holds the shard lock, so check-and-increment is atomic per key.
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(WindowState {
                started: now,
                count: 0,
            });

        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = WindowState {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            tracing::warn!(caller = %key, count = entry.count, "Rate limit exceeded");
            return Err(AppError::RateLimitExceeded {
                retry_after_secs: self.retry_after_secs,
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop state for callers whose window has expired.
    pub fn prune_idle(&self) {
        let before = self.windows.len();
        let now = Instant::now();
        self.windows
            .retain(|_, state| now.saturating_duration_since(state.started) < self.window);
        self.windows.shrink_to_fit();
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!(removed_count = removed, "Pruned idle rate limit entries");
        }
    }

    /// Number of caller keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_secs
    }

    /// Whether forwarding headers from a reverse proxy identify the caller.
    pub fn trusts_proxy(&self) -> bool {
        self.trust_proxy
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}
