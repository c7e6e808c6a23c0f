//! Wire types for the chat endpoint.

use axum::response::sse::Event;
use serde::Serialize;

use crate::domain::chat::{StreamEvent, UpstreamFailure};

/// Body of every 400/429 response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub error: String,
    /// Stable machine-readable code.
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Frames a relay event as `data: <json>`.
pub fn sse_event(event: &StreamEvent) -> Event {
    match Event::default().json_data(event) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode relay event");
            Event::default().data(format!(
                r#"{{"type":"error","message":"{}"}}"#,
                UpstreamFailure::Unknown.user_message()
            ))
        }
    }
}
