//! Rate limiting middleware for axum.
//!
//! Counts every request to the wrapped route against the caller's window
//! using the `RateLimiter` port. Denied requests never reach the handler.
//!
//! Rate limit status is returned in standard HTTP headers:
//! - `X-RateLimit-Limit`: Maximum requests allowed in the window
//! - `X-RateLimit-Remaining`: Requests remaining in the current window
//! - `X-RateLimit-Reset`: Unix timestamp when the window resets
//! - `Retry-After`: Seconds to wait (only on 429 response)
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::post, middleware};
//! use std::sync::Arc;
//!
//! let limiter: Arc<dyn RateLimiter> = Arc::new(InMemoryRateLimiter::with_defaults());
//!
//! let app = Router::new()
//!     .route("/api/chat", post(handler))
//!     .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::adapters::http::chat::ChatApiError;
use crate::ports::{CallerKey, RateLimitResult, RateLimitStatus, RateLimiter};

/// Rate limiter middleware state.
pub type RateLimiterState = Arc<dyn RateLimiter>;

/// Standard rate limit header names.
pub mod headers {
    use super::HeaderName;

    /// Maximum requests allowed in the window.
    pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
    /// Requests remaining in the current window.
    pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
    /// Unix timestamp when the window resets.
    pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
}

/// Per-caller rate limiting.
///
/// Returns 429 Too Many Requests when the caller's window is exhausted.
/// A failing limiter backend admits the request.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiterState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let caller = extract_client_ip(&request, connect_info.as_ref())
        .map(CallerKey::from_ip)
        .unwrap_or_else(CallerKey::unknown);

    let status = match limiter.check(&caller).await {
        Ok(RateLimitResult::Allowed(status)) => Some(status),
        Ok(RateLimitResult::Denied(denied)) => {
            tracing::info!(
                caller = %caller,
                limit = denied.limit,
                retry_after_secs = denied.retry_after_secs,
                "Rate limit exceeded"
            );
            return ChatApiError::RateLimited(denied).into_response();
        }
        Err(e) => {
            tracing::warn!(caller = %caller, error = %e, "Rate limiter unavailable, admitting request");
            None
        }
    };

    let mut response = next.run(request).await;
    if let Some(status) = status {
        add_rate_limit_headers(&mut response, &status);
    }
    response
}

/// Extract client IP from request, checking forwarded headers first.
///
/// Order of precedence:
/// 1. X-Forwarded-For header (first IP in list)
/// 2. X-Real-IP header
/// 3. ConnectInfo socket address
pub fn extract_client_ip<B>(
    request: &axum::http::Request<B>,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    if let Some(first_ip) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return Some(first_ip.to_string());
    }

    if let Some(real_ip) = request
        .headers()
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return Some(real_ip.to_string());
    }

    connect_info.map(|ci| ci.0.ip().to_string())
}

/// Add rate limit headers to an admitted response.
fn add_rate_limit_headers(response: &mut Response, status: &RateLimitStatus) {
    let headers = response.headers_mut();
    headers.insert(
        headers::X_RATELIMIT_LIMIT.clone(),
        HeaderValue::from(status.limit),
    );
    headers.insert(
        headers::X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(status.remaining),
    );
    headers.insert(
        headers::X_RATELIMIT_RESET.clone(),
        HeaderValue::from(status.reset_at.as_unix_secs()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
    use axum::{body::Body, http::StatusCode, middleware, routing::post, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    // ─── IP Extraction ───────────────────────────────────────────────

    #[test]
    fn extract_ip_from_x_forwarded_for() {
        let request = axum::http::Request::builder()
            .uri("/test")
            .header("X-Forwarded-For", "1.2.3.4, 5.6.7.8")
            .body(())
            .unwrap();

        assert_eq!(extract_client_ip(&request, None), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_ip_from_x_real_ip() {
        let request = axum::http::Request::builder()
            .uri("/test")
            .header("X-Real-IP", "9.8.7.6")
            .body(())
            .unwrap();

        assert_eq!(extract_client_ip(&request, None), Some("9.8.7.6".to_string()));
    }

    #[test]
    fn extract_ip_prefers_x_forwarded_for() {
        let request = axum::http::Request::builder()
            .uri("/test")
            .header("X-Forwarded-For", "1.2.3.4")
            .header("X-Real-IP", "5.6.7.8")
            .body(())
            .unwrap();

        assert_eq!(extract_client_ip(&request, None), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_ip_falls_back_to_socket_address() {
        let request = axum::http::Request::builder().uri("/test").body(()).unwrap();
        let peer = ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4000)));

        assert_eq!(extract_client_ip(&request, Some(&peer)), Some("10.0.0.7".to_string()));
        assert_eq!(extract_client_ip(&request, None), None);
    }

    // ─── Middleware ──────────────────────────────────────────────────

    fn limited_app(max_requests: u32) -> Router {
        let limiter: RateLimiterState = Arc::new(InMemoryRateLimiter::new(RateLimitConfig::new(
            max_requests,
            Duration::from_secs(60),
        )));
        Router::new()
            .route("/limited", post(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
    }

    fn request_from(ip: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/limited")
            .header("X-Forwarded-For", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn admitted_responses_carry_status_headers() {
        let app = limited_app(3);

        let response = app.oneshot(request_from("1.1.1.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "3");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "2");
        assert!(response.headers().contains_key("x-ratelimit-reset"));
    }

    #[tokio::test]
    async fn request_over_limit_is_rejected() {
        let app = limited_app(2);

        for _ in 0..2 {
            let response = app.clone().oneshot(request_from("1.1.1.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.clone().oneshot(request_from("1.1.1.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn callers_are_limited_independently() {
        let app = limited_app(1);

        let first = app.clone().oneshot(request_from("1.1.1.1")).await.unwrap();
        let other = app.clone().oneshot(request_from("2.2.2.2")).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(other.status(), StatusCode::OK);
    }
}
