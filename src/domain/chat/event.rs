//! Events relayed to the widget over the event stream.

use serde::{Deserialize, Serialize};

/// One frame of a relayed response.
///
/// A sequence carries any number of `TextDelta` events followed by at
/// most one terminal event (`MessageStop` or `Error`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// An increment of generated text, forwarded as received.
    TextDelta { text: String },
    /// Generation finished normally.
    MessageStop,
    /// Generation failed; `message` is safe to show to the visitor.
    Error { message: String },
}

impl StreamEvent {
    pub fn text_delta(text: impl Into<String>) -> Self {
        StreamEvent::TextDelta { text: text.into() }
    }

    pub fn error(failure: UpstreamFailure) -> Self {
        StreamEvent::Error {
            message: failure.user_message().to_string(),
        }
    }

    /// Returns true for events that end the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::MessageStop | StreamEvent::Error { .. })
    }
}

/// Caller-safe classification of upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// Credentials rejected by the provider.
    Auth,
    /// Provider overloaded or rate limiting us.
    Busy,
    /// Anything else.
    Unknown,
}

impl UpstreamFailure {
    /// Fixed message shown to the visitor for this failure class.
    pub fn user_message(&self) -> &'static str {
        match self {
            UpstreamFailure::Auth => {
                "The assistant is not configured correctly. Please contact support."
            }
            UpstreamFailure::Busy => {
                "The assistant is busy right now. Please try again in a moment."
            }
            UpstreamFailure::Unknown => "An error occurred. Please try again.",
        }
    }

    /// Whether the widget may offer a retry action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UpstreamFailure::Busy | UpstreamFailure::Unknown)
    }
}
