//! Lifecycle of a single relayed request.

use crate::domain::foundation::StateMachine;

/// Relay lifecycle: `Open → Streaming → {Stopped | Errored | Aborted}`.
///
/// A relay that fails or loses its caller before the first increment goes
/// straight from `Open` to `Errored` or `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayState {
    Open,
    Streaming,
    Stopped,
    Errored,
    Aborted,
}

impl StateMachine for RelayState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use RelayState::*;
        matches!(
            (self, target),
            (Open, Streaming)
                | (Open, Stopped)
                | (Open, Errored)
                | (Open, Aborted)
                | (Streaming, Stopped)
                | (Streaming, Errored)
                | (Streaming, Aborted)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use RelayState::*;
        match self {
            Open => vec![Streaming, Stopped, Errored, Aborted],
            Streaming => vec![Stopped, Errored, Aborted],
            Stopped | Errored | Aborted => vec![],
        }
    }
}
