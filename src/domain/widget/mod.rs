//! Client-side widget domain.
//!
//! The view and the request lifecycle are independent state types; the
//! conversation controller composes them.

mod display;
mod request;
mod view;

pub use display::{DisplayMessage, DisplayRole};
pub use request::{CancelPolicy, RequestStatus};
pub use view::{View, ViewKind};
