//! State machine trait for lifecycle enums.
//!
//! Provides a consistent interface for validating and performing state transitions
//! across the relay lifecycle and the widget's request lifecycle.

use thiserror::Error;

/// Rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: String,
    pub to: String,
}

/// Trait for status enums that represent state machines.
///
/// Implementors define valid state transitions and get validated
/// transition methods for free.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for RelayState {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Open, Streaming) | (Streaming, Stopped))
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             Open => vec![Streaming],
///             Streaming => vec![Stopped],
///             Stopped => vec![],
///         }
///     }
/// }
///
/// let next = RelayState::Open.transition_to(RelayState::Streaming)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(InvalidTransition {
                from: format!("{:?}", self),
                to: format!("{:?}", target),
            })
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Closed,
        Open,
        Broken,
    }

    impl StateMachine for Door {
        fn can_transition_to(&self, target: &Self) -> bool {
            self.valid_transitions().contains(target)
        }

        fn valid_transitions(&self) -> Vec<Self> {
            match self {
                Door::Closed => vec![Door::Open, Door::Broken],
                Door::Open => vec![Door::Closed, Door::Broken],
                Door::Broken => vec![],
            }
        }
    }

    #[test]
    fn transition_to_succeeds_for_valid_transition() {
        assert_eq!(Door::Closed.transition_to(Door::Open), Ok(Door::Open));
    }

    #[test]
    fn transition_to_fails_for_invalid_transition() {
        let err = Door::Broken.transition_to(Door::Open).unwrap_err();
        assert_eq!(err.from, "Broken");
        assert_eq!(err.to, "Open");
        assert_eq!(err.to_string(), "cannot transition from Broken to Open");
    }

    #[test]
    fn is_terminal_only_for_states_without_exits() {
        assert!(Door::Broken.is_terminal());
        assert!(!Door::Closed.is_terminal());
    }
}
