//! HTTP handlers for the chat relay.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;

use crate::application::StreamRelay;
use crate::domain::chat::{ChatPayload, RequestValidator, ValidationError};
use crate::ports::RateLimiter;

use super::dto::{sse_event, HealthResponse};
use super::error::ChatApiError;

/// Application state for the chat endpoints.
#[derive(Clone)]
pub struct ChatAppState {
    /// Streams accepted requests upstream.
    pub relay: Arc<StreamRelay>,
    pub validator: RequestValidator,
    /// Per-caller admission, applied by the rate limit middleware.
    pub rate_limiter: Arc<dyn RateLimiter>,
}

/// Relay a conversation as a server-sent event stream.
///
/// POST /api/chat
///
/// The response stream ends after `message_stop` or `error`. If the caller
/// disconnects first, the relay run is aborted.
pub async fn chat(
    State(state): State<ChatAppState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ChatApiError> {
    let Json(payload) =
        payload.map_err(|rejection| ValidationError::MalformedBody(rejection.body_text()))?;

    let request = state.validator.validate(&payload).map_err(|e| {
        tracing::info!(code = e.code(), reason = %e, "Rejected chat request");
        e
    })?;

    let (events, _run) = state.relay.clone().spawn(request);
    let stream = ReceiverStream::new(events).map(|event| Ok(sse_event(&event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Answers CORS preflights that reach the route directly.
///
/// OPTIONS /api/chat
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Liveness probe.
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
