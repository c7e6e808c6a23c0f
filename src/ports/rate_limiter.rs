//! Rate limiting port for protecting the relay and its upstream budget.
//!
//! Counters are keyed by caller identity and use a fixed window. The
//! in-memory adapter is process-local; a shared store for multi-instance
//! deployments would implement this same trait.

use async_trait::async_trait;
use std::fmt;

use crate::domain::foundation::Timestamp;

/// Port for rate limiting operations.
///
/// Implementations must serialize updates per key without a process-wide
/// lock, so unrelated callers never contend.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one request for `key` and decides whether it is admitted.
    ///
    /// Rejected requests still count toward the current window.
    async fn check(&self, key: &CallerKey) -> Result<RateLimitResult, RateLimitError>;

    /// Boolean admission, failing open when the backend errors.
    async fn admit(&self, key: &CallerKey) -> bool {
        match self.check(key).await {
            Ok(result) => result.is_allowed(),
            Err(e) => {
                tracing::warn!(caller = %key, error = %e, "Rate limiter unavailable, admitting request");
                true
            }
        }
    }
}

/// Identity used to bucket rate-limit counters.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CallerKey(String);

impl CallerKey {
    /// Key for a network address.
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self(ip.into())
    }

    /// Shared bucket for callers whose address cannot be determined.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed; includes current status.
    Allowed(RateLimitStatus),
    /// Request is denied; includes denial details.
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    /// Returns true if the request was allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    /// Returns true if the request was denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }
}

/// Current rate limit status.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Remaining requests in the current window.
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: Timestamp,
    /// Window duration in seconds.
    pub window_secs: u32,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone)]
pub struct RateLimitDenied {
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Seconds until the client should retry.
    pub retry_after_secs: u32,
    /// Human-readable message explaining the denial.
    pub message: String,
}

/// Errors that can occur during rate limiting operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Rate limiter backend is unavailable.
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}
