//! Integration tests for the chat relay HTTP surface.
//!
//! These tests drive the full router through `tower::ServiceExt::oneshot`:
//! 1. Accepted requests stream relay events as SSE
//! 2. Invalid requests get a 400 before any upstream call
//! 3. Callers over their window get a 429 before any upstream call
//! 4. CORS allow-list and preflight handling

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use chat_widget::adapters::ai::{MockAIProvider, MockError};
use chat_widget::adapters::http::{app_router, ChatAppState};
use chat_widget::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
use chat_widget::application::{RelaySettings, StreamRelay};
use chat_widget::domain::chat::{Message, RequestValidator, SystemPromptComposer};

// =============================================================================
// Test Infrastructure
// =============================================================================

const ALLOWED_ORIGIN: &str = "https://shop.example.com";

fn app(provider: &MockAIProvider, max_requests: u32) -> Router {
    let relay = StreamRelay::new(
        Arc::new(provider.clone()),
        SystemPromptComposer::default(),
        RelaySettings::default(),
    );
    let limiter = InMemoryRateLimiter::new(RateLimitConfig::new(
        max_requests,
        Duration::from_secs(60),
    ));
    let state = ChatAppState {
        relay: Arc::new(relay),
        validator: RequestValidator::default(),
        rate_limiter: Arc::new(limiter),
    };
    app_router(state, &[ALLOWED_ORIGIN.to_string()])
}

fn chat_request(body: impl Into<Body>, ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Forwarded-For", ip)
        .body(body.into())
        .unwrap()
}

fn conversation(n: usize) -> Value {
    let messages: Vec<Value> = (0..n)
        .map(|i| {
            let role = if i % 2 == 0 { "user" } else { "assistant" };
            json!({"role": role, "content": format!("m{}", i)})
        })
        .collect();
    json!({"messages": messages, "language": "en"})
}

fn hello() -> String {
    json!({"messages": [{"role": "user", "content": "Hi"}], "language": "en"}).to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Parses `data:` frames from an SSE body.
async fn sse_events(response: Response) -> Vec<Value> {
    body_text(response)
        .await
        .split("\n\n")
        .filter_map(|frame| {
            frame
                .lines()
                .find_map(|line| line.strip_prefix("data:"))
                .map(|data| serde_json::from_str(data.trim()).unwrap())
        })
        .collect()
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn accepted_request_streams_deltas_then_stop() {
    let provider = MockAIProvider::new().with_chunks(["Hel", "lo"]);
    let app = app(&provider, 20);

    let response = app.oneshot(chat_request(hello(), "1.1.1.1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(response.headers()["x-ratelimit-remaining"], "19");

    let events = sse_events(response).await;
    assert_eq!(
        events,
        vec![
            json!({"type": "text_delta", "text": "Hel"}),
            json!({"type": "text_delta", "text": "lo"}),
            json!({"type": "message_stop"}),
        ]
    );
}

#[tokio::test]
async fn upstream_failure_becomes_one_safe_error_event() {
    let provider = MockAIProvider::new().with_error(MockError::AuthenticationFailed);
    let app = app(&provider, 20);

    let response = app.oneshot(chat_request(hello(), "1.1.1.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = sse_events(response).await;
    assert_eq!(
        events,
        vec![json!({
            "type": "error",
            "message": "The assistant is not configured correctly. Please contact support."
        })]
    );
}

#[tokio::test]
async fn long_history_is_trimmed_before_upstream() {
    let provider = MockAIProvider::new();
    let app = app(&provider, 20);

    let response = app
        .oneshot(chat_request(conversation(25).to_string(), "1.1.1.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    sse_events(response).await;

    let calls = provider.get_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].messages.len(), 20);
    assert_eq!(calls[0].messages.first(), Some(&Message::assistant("m5")));
    assert_eq!(calls[0].messages.last(), Some(&Message::user("m24")));
}

// =============================================================================
// Validation
// =============================================================================

async fn assert_rejected(body: String, code: &str) {
    let provider = MockAIProvider::new();
    let app = app(&provider, 20);

    let response = app.oneshot(chat_request(body, "1.1.1.1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], code);
    assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn missing_messages_is_rejected() {
    assert_rejected(json!({"language": "en"}).to_string(), "MISSING_MESSAGES").await;
}

#[tokio::test]
async fn empty_messages_is_rejected() {
    assert_rejected(json!({"messages": []}).to_string(), "MISSING_MESSAGES").await;
}

#[tokio::test]
async fn too_many_messages_is_rejected() {
    assert_rejected(conversation(51).to_string(), "TOO_MANY_MESSAGES").await;
}

#[tokio::test]
async fn oversized_message_is_rejected() {
    let body = json!({"messages": [{"role": "user", "content": "x".repeat(4001)}]});
    assert_rejected(body.to_string(), "MESSAGE_TOO_LONG").await;
}

#[tokio::test]
async fn non_text_content_is_rejected() {
    let body = json!({"messages": [{"role": "user", "content": ["not", "text"]}]});
    assert_rejected(body.to_string(), "INVALID_CONTENT").await;
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    assert_rejected("{not json".to_string(), "MALFORMED_BODY").await;
}

// =============================================================================
// Rate Limiting
// =============================================================================

#[tokio::test]
async fn request_over_window_gets_429_without_upstream_call() {
    let provider = MockAIProvider::new();
    let app = app(&provider, 20);

    for _ in 0..20 {
        let response = app
            .clone()
            .oneshot(chat_request(hello(), "7.7.7.7"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        sse_events(response).await;
    }
    assert_eq!(provider.call_count(), 20);

    let response = app
        .clone()
        .oneshot(chat_request(hello(), "7.7.7.7"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let json = body_json(response).await;
    assert_eq!(json["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(provider.call_count(), 20);

    let other = app
        .oneshot(chat_request(hello(), "8.8.8.8"))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn invalid_requests_still_count_toward_the_window() {
    let provider = MockAIProvider::new();
    let app = app(&provider, 2);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(chat_request("{}", "3.3.3.3"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app.oneshot(chat_request(hello(), "3.3.3.3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn preflight_gets_204_without_body() {
    let provider = MockAIProvider::new();
    let app = app(&provider, 20);

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/chat")
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn preflight_does_not_consume_rate_limit() {
    let provider = MockAIProvider::new();
    let app = app(&provider, 1);

    for _ in 0..3 {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/chat")
            .header(header::ORIGIN, ALLOWED_ORIGIN)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header("X-Forwarded-For", "4.4.4.4")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = app.oneshot(chat_request(hello(), "4.4.4.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn allowed_origin_gets_cors_header() {
    let provider = MockAIProvider::new();
    let app = app(&provider, 20);

    let mut request = chat_request(hello(), "1.1.1.1");
    request
        .headers_mut()
        .insert(header::ORIGIN, ALLOWED_ORIGIN.parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
}

#[tokio::test]
async fn unlisted_origin_gets_no_cors_header() {
    let provider = MockAIProvider::new();
    let app = app(&provider, 20);

    let mut request = chat_request(hello(), "1.1.1.1");
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://evil.example.com".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let provider = MockAIProvider::new();
    let app = app(&provider, 20);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}
