//! Chat relay domain: messages, request validation, context trimming,
//! relayed events and the relay lifecycle.

mod context;
mod event;
mod message;
mod prompt;
mod relay_state;
mod validation;

pub use context::trim_context;
pub use event::{StreamEvent, UpstreamFailure};
pub use message::{Message, MessageRole};
pub use prompt::SystemPromptComposer;
pub use relay_state::RelayState;
pub use validation::{ChatLimits, ChatPayload, RequestValidator, ValidatedRequest, ValidationError};
