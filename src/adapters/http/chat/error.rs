//! Error responses for the chat endpoint.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::adapters::http::middleware::headers;
use crate::domain::chat::ValidationError;
use crate::domain::foundation::Timestamp;
use crate::ports::RateLimitDenied;

use super::dto::ErrorResponse;

/// Rejections returned before any stream is opened.
#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}", .0.message)]
    RateLimited(RateLimitDenied),
}

impl ChatApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ChatApiError::Validation(e) => e.code(),
            ChatApiError::RateLimited(_) => "RATE_LIMIT_EXCEEDED",
        }
    }
}

impl IntoResponse for ChatApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(self.to_string(), self.code());
        let mut response = (self.status_code(), Json(body)).into_response();

        if let ChatApiError::RateLimited(denied) = &self {
            let reset_at = Timestamp::now().plus_secs(u64::from(denied.retry_after_secs));
            let headers_mut = response.headers_mut();
            headers_mut.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(denied.retry_after_secs),
            );
            headers_mut.insert(
                headers::X_RATELIMIT_LIMIT.clone(),
                HeaderValue::from(denied.limit),
            );
            headers_mut.insert(headers::X_RATELIMIT_REMAINING.clone(), HeaderValue::from(0u32));
            headers_mut.insert(
                headers::X_RATELIMIT_RESET.clone(),
                HeaderValue::from(reset_at.as_unix_secs()),
            );
        }

        response
    }
}
