//! Background purge of expired rate-limit windows.
//!
//! Runs on its own interval timer, independent of request handling, and
//! stops when the shutdown signal flips to `true`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use super::InMemoryRateLimiter;

/// Periodic cleanup service for [`InMemoryRateLimiter`].
pub struct RateLimitCleanup {
    limiter: Arc<InMemoryRateLimiter>,
    interval: Duration,
}

impl RateLimitCleanup {
    /// Cleanup at the limiter's configured interval.
    pub fn new(limiter: Arc<InMemoryRateLimiter>) -> Self {
        let interval = limiter.config().cleanup_interval();
        Self::with_interval(limiter, interval)
    }

    pub fn with_interval(limiter: Arc<InMemoryRateLimiter>, interval: Duration) -> Self {
        Self {
            limiter,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Run the cleanup loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval_at(time::Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Rate limit cleanup stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.run_once();
                }
            }
        }
    }

    /// Purge once; returns the number of entries removed.
    pub fn run_once(&self) -> usize {
        let purged = self.limiter.purge_expired();
        if purged > 0 {
            tracing::debug!(
                purged,
                remaining = self.limiter.tracked_callers(),
                "Purged expired rate limit windows"
            );
        }
        purged
    }

    /// Spawns the loop onto the runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
