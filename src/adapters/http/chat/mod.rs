//! Chat HTTP adapter - the relay's public surface.
//!
//! Provides endpoints for:
//! - Streaming a reply to a conversation (`POST /api/chat`)
//! - Liveness (`GET /health`)

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;

pub use dto::{ErrorResponse, HealthResponse};
pub use error::ChatApiError;
pub use handlers::ChatAppState;
pub use routes::chat_router;
