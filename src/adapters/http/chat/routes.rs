//! Axum router configuration for the chat relay.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::adapters::http::middleware::rate_limit_middleware;

use super::handlers::{chat, health, preflight, ChatAppState};

/// Create the chat router.
///
/// # Routes
///
/// - `POST /api/chat` - Relay a conversation as SSE (rate limited)
/// - `OPTIONS /api/chat` - Preflight, 204 with no body
/// - `GET /health` - Liveness probe
pub fn chat_router(state: &ChatAppState) -> Router<ChatAppState> {
    let limited = post(chat).route_layer(middleware::from_fn_with_state(
        state.rate_limiter.clone(),
        rate_limit_middleware,
    ));

    Router::new()
        .route("/api/chat", limited.options(preflight))
        .route("/health", get(health))
}
