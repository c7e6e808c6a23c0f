//! Conversation controller settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::widget::CancelPolicy;

/// Client-side behaviour of the conversation controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Minimum time the thinking indicator stays up after a submission.
    #[serde(default = "default_min_thinking_ms")]
    pub min_thinking_ms: u64,
    /// What happens to shown text when a stream is cancelled.
    #[serde(default)]
    pub cancel_policy: CancelPolicy,
    /// Language hint sent with every request.
    #[serde(default = "default_language")]
    pub language: String,
    /// Most recent messages sent to the relay per request.
    #[serde(default = "default_max_outbound_messages")]
    pub max_outbound_messages: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_thinking_ms: default_min_thinking_ms(),
            cancel_policy: CancelPolicy::default(),
            language: default_language(),
            max_outbound_messages: default_max_outbound_messages(),
        }
    }
}

impl ControllerConfig {
    pub fn min_thinking(&self) -> Duration {
        Duration::from_millis(self.min_thinking_ms)
    }

    pub fn with_min_thinking(mut self, min_thinking: Duration) -> Self {
        self.min_thinking_ms = min_thinking.as_millis() as u64;
        self
    }

    pub fn with_cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

fn default_min_thinking_ms() -> u64 {
    800
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_outbound_messages() -> usize {
    50
}
