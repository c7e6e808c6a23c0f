//! Client-side conversation controller.

mod config;
mod controller;

pub use config::ControllerConfig;
pub use controller::{ControllerError, ControllerUpdate, ConversationController};
