//! In-memory rate limiter for single-instance deployments.
//!
//! Uses a fixed-window counter per caller on a sharded concurrent map, so
//! each update locks only the caller's shard. State lives for the process
//! lifetime; expired windows are purged by [`RateLimitCleanup`].
//!
//! [`RateLimitCleanup`]: super::RateLimitCleanup

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    CallerKey, RateLimitDenied, RateLimitError, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::RateLimitConfig;

/// Fixed-window rate limiter backed by process memory.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    windows: DashMap<CallerKey, WindowState>,
}

/// State for a single caller's window.
#[derive(Debug, Clone)]
struct WindowState {
    /// Requests counted in the current window, rejected ones included.
    count: u32,
    /// When the current window started.
    window_start: Instant,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Create a rate limiter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of callers currently tracked.
    pub fn tracked_callers(&self) -> usize {
        self.windows.len()
    }

    /// Removes entries whose window has ended; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let window = self.config.window();
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, state| now.duration_since(state.window_start) <= window);
        before.saturating_sub(self.windows.len())
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &CallerKey) -> Result<RateLimitResult, RateLimitError> {
        let limit = self.config.max_requests;
        let window = self.config.window();
        let now = Instant::now();

        let mut entry = self.windows.entry(key.clone()).or_insert(WindowState {
            count: 0,
            window_start: now,
        });
        let state = entry.value_mut();

        // A request exactly at the window end still counts in that window.
        if now.duration_since(state.window_start) > window {
            state.count = 0;
            state.window_start = now;
        }

        state.count = state.count.saturating_add(1);
        let remaining_window = window.saturating_sub(now.duration_since(state.window_start));
        let count = state.count;
        drop(entry);

        // Round up so callers never retry a fraction of a second early.
        let reset_in_secs = remaining_window.as_secs()
            + u64::from(remaining_window.subsec_nanos() > 0);

        if count > limit {
            let retry_after_secs = reset_in_secs.max(1) as u32;
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit,
                retry_after_secs,
                message: format!(
                    "Too many requests. Please wait {} seconds before trying again.",
                    retry_after_secs
                ),
            }));
        }

        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit,
            remaining: limit - count,
            reset_at: Timestamp::now().plus_secs(reset_in_secs),
            window_secs: self.config.window_secs as u32,
        }))
    }
}
