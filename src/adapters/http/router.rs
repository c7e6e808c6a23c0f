//! Complete application router.

use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::chat::{chat_router, ChatAppState};
use super::middleware::{build_cors_layer, preflight_no_content};

/// Builds the relay's router with CORS and request tracing applied.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// rate limiter can fall back to the peer address.
pub fn app_router(state: ChatAppState, cors_origins: &[String]) -> Router {
    chat_router(&state).with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(preflight_no_content))
            .layer(build_cors_layer(cors_origins)),
    )
}
