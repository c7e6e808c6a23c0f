//! Rate limit configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-caller fixed-window limits for the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per caller per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window duration in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// How often expired entries are purged.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Creates a config with the given limit and window.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_secs: window.as_secs(),
            ..Self::default()
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

fn default_max_requests() -> u32 {
    20
}

fn default_window_secs() -> u64 {
    60
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_twenty_per_minute() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 20);
        assert_eq!(config.window(), Duration::from_secs(60));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(300));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: RateLimitConfig = serde_json::from_str(r#"{"max_requests": 5}"#).unwrap();
        assert_eq!(config.max_requests, 5);
        assert_eq!(config.window_secs, 60);
    }
}
