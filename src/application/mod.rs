//! Application layer - Orchestration over domain types and ports.
//!
//! - `relay` - server side: stream one validated conversation upstream and
//!   forward the reply as relay events
//! - `widget` - client side: view and request lifecycle of one widget

pub mod relay;
pub mod widget;

pub use relay::{RelayOutcome, RelaySettings, StreamRelay};
pub use widget::{ControllerConfig, ControllerError, ControllerUpdate, ConversationController};
