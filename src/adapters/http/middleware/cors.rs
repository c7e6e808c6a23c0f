//! Cross-origin policy for the embeddable widget.

use axum::{extract::Request, middleware::Next, response::Response};
use http::{header, HeaderValue, Method, StatusCode};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build the CORS layer from the configured origin allow-list.
///
/// Origins not on the list get no `Access-Control-Allow-Origin` header, so
/// the browser refuses the response. An empty list denies every origin.
pub fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS: No origins configured, denying all cross-origin requests");
    } else {
        tracing::info!(count = origins.len(), "CORS: Allowing configured origins");
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Rewrites successful `OPTIONS` responses to 204 No Content.
///
/// Preflights answered by [`CorsLayer`] come back as 200 with an empty body.
pub async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
