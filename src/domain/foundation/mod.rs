//! Foundation module - Shared domain primitives.
//!
//! Value objects and traits used by both the relay and the widget.

mod state_machine;
mod timestamp;

pub use state_machine::{InvalidTransition, StateMachine};
pub use timestamp::Timestamp;
