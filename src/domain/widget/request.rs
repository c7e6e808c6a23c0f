//! Request lifecycle of the conversation controller.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Where the controller is in handling a submission.
///
/// Completion and failure fold straight back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestStatus {
    #[default]
    Idle,
    /// Request sent, nothing visible yet.
    Submitting,
    /// Text is being appended to the in-progress message.
    Streaming,
}

impl RequestStatus {
    pub fn is_in_flight(&self) -> bool {
        !matches!(self, RequestStatus::Idle)
    }
}

impl StateMachine for RequestStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use RequestStatus::*;
        matches!(
            (self, target),
            (Idle, Submitting) | (Submitting, Streaming) | (Submitting, Idle) | (Streaming, Idle)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use RequestStatus::*;
        match self {
            Idle => vec![Submitting],
            Submitting => vec![Streaming, Idle],
            Streaming => vec![Idle],
        }
    }
}

/// What happens to partially streamed text when a request is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Keep what has been shown and mark it final.
    #[default]
    KeepPartial,
    /// Remove the in-progress message.
    Discard,
}
