//! HTTP adapters - The relay's REST/SSE surface.
//!
//! Each concern has its own module; `app_router` assembles them.

pub mod chat;
pub mod middleware;
mod router;

// Re-export key types for convenience
pub use chat::{chat_router, ChatApiError, ChatAppState};
pub use router::app_router;
