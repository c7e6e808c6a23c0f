//! Anthropic Provider - Implementation of AIProvider for Anthropic's Messages API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = AnthropicConfig::new(api_key)
//!     .with_model("claude-sonnet-4-20250514")
//!     .with_base_url("https://api.anthropic.com");
//!
//! let provider = AnthropicProvider::new(config)?;
//! ```
//!
//! # Streaming
//!
//! Uses Server-Sent Events with Anthropic's event format. Text arrives in
//! `content_block_delta` events, the stop reason and output usage in
//! `message_delta`, and failures mid-stream in `error` events.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::adapters::sse::{sse_frames, SseFrame};
use crate::domain::chat::MessageRole;
use crate::ports::{
    AIError, AIProvider, ChunkStream, CompletionRequest, FinishReason, ProviderInfo, StreamChunk,
    TokenUsage,
};

/// Configuration for the Anthropic provider.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Model to use (e.g., "claude-sonnet-4-20250514").
    pub model: String,
    /// Base URL for the API (default: https://api.anthropic.com).
    pub base_url: String,
    /// Request timeout, covering the whole streamed response.
    pub timeout: Duration,
    /// Maximum retries when opening the stream fails transiently.
    pub max_retries: u32,
    /// Default generation budget when the request sets none.
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 2,
            max_tokens: 1024,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the default max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Exposes the API key (for making requests).
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Anthropic API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Anthropic API provider implementation.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AIError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Builds the messages endpoint URL.
    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    /// Converts our request to Anthropic's format.
    ///
    /// Anthropic requires the conversation to open with a user turn, so
    /// assistant messages left at the front by trimming are dropped.
    fn to_anthropic_request(&self, request: &CompletionRequest) -> Result<AnthropicRequest, AIError> {
        let messages: Vec<AnthropicMessage> = request
            .messages
            .iter()
            .skip_while(|m| m.role == MessageRole::Assistant)
            .map(|m| AnthropicMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();

        if messages.is_empty() {
            return Err(AIError::InvalidRequest(
                "conversation contains no user message".to_string(),
            ));
        }

        Ok(AnthropicRequest {
            model: self.config.model.clone(),
            messages,
            system: request.system_prompt.clone(),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature,
            stream: true,
        })
    }

    /// Sends a streaming request.
    async fn send_streaming_request(&self, body: &AnthropicRequest) -> Result<Response, AIError> {
        self.client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AIError::Timeout {
                        timeout_secs: self.config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    AIError::network(format!("Connection failed: {}", e))
                } else {
                    AIError::network(e.to_string())
                }
            })
    }

    /// Parses the API response status and handles errors.
    async fn handle_response_status(&self, response: Response) -> Result<Response, AIError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let error_body = response.text().await.unwrap_or_default();

        Err(error_for_status(status.as_u16(), &error_body, retry_after))
    }

    /// Opens the stream, retrying transient failures with exponential backoff.
    async fn open_stream(&self, body: &AnthropicRequest) -> Result<Response, AIError> {
        let mut retry_count = 0;

        loop {
            let result = match self.send_streaming_request(body).await {
                Ok(response) => self.handle_response_status(response).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && retry_count < self.config.max_retries => {
                    tracing::warn!(
                        attempt = retry_count + 1,
                        error = %err,
                        "Anthropic stream open failed, retrying"
                    );
                    // Exponential backoff: 1s, 2s, 4s, ...
                    sleep(backoff(retry_count)).await;
                    retry_count += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl AIProvider for AnthropicProvider {
    async fn stream_complete(&self, request: CompletionRequest) -> Result<ChunkStream, AIError> {
        let body = self.to_anthropic_request(&request)?;
        let response = self.open_stream(&body).await?;

        let frames = Box::pin(sse_frames(response.bytes_stream()));
        let stream = stream::unfold(
            Some((frames, AnthropicEventParser::default())),
            |state| async move {
                let (mut frames, mut parser) = state?;
                loop {
                    match frames.next().await {
                        Some(Ok(frame)) => {
                            if let Some(item) = parser.parse(&frame) {
                                return Some((item, Some((frames, parser))));
                            }
                        }
                        Some(Err(e)) => {
                            let err = AIError::network(format!("Stream error: {}", e));
                            return Some((Err(err), Some((frames, parser))));
                        }
                        None if parser.finished => return None,
                        None => {
                            let err = AIError::network("stream ended before message_stop");
                            return Some((Err(err), None));
                        }
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("anthropic", &self.config.model)
    }
}

/// Maps a non-success HTTP status onto an [`AIError`].
fn error_for_status(status: u16, body: &str, retry_after: Option<u32>) -> AIError {
    match status {
        401 | 403 => AIError::AuthenticationFailed,
        429 => AIError::rate_limited(retry_after.unwrap_or(60)),
        529 | 503 => AIError::Overloaded,
        400 => AIError::InvalidRequest(body.to_string()),
        500..=599 => AIError::unavailable(format!("Server error {}: {}", status, body)),
        _ => AIError::network(format!("Unexpected status {}: {}", status, body)),
    }
}

/// Longest wait between stream-open attempts.
const MAX_BACKOFF_SECS: u64 = 30;

/// Exponential backoff for the given retry: 1s, 2s, 4s, ... capped.
fn backoff(retry_count: u32) -> Duration {
    let secs = 1u64
        .checked_shl(retry_count)
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Turns Anthropic SSE frames into chunks, one frame at a time.
///
/// Anthropic SSE format uses `event:` and `data:` lines:
/// ```text
/// event: content_block_delta
/// data: {"type":"content_block_delta","delta":{"type":"text_delta","text":"Hello"}}
/// ```
///
/// Prompt token counts arrive in `message_start` and are carried into the
/// final chunk. `finished` records whether the message reached its end.
#[derive(Debug, Default)]
struct AnthropicEventParser {
    input_tokens: u32,
    finished: bool,
}

impl AnthropicEventParser {
    fn parse(&mut self, frame: &SseFrame) -> Option<Result<StreamChunk, AIError>> {
        match frame.event.as_deref() {
            Some("message_start") => {
                if let Ok(start) = serde_json::from_str::<MessageStart>(&frame.data) {
                    if let Some(tokens) = start.message.usage.and_then(|u| u.input_tokens) {
                        self.input_tokens = tokens;
                    }
                }
                None
            }
            Some("content_block_delta") => {
                let delta = match serde_json::from_str::<ContentBlockDelta>(&frame.data) {
                    Ok(delta) => delta,
                    Err(e) => {
                        return Some(Err(AIError::parse(format!("content_block_delta: {}", e))))
                    }
                };
                delta
                    .delta
                    .text
                    .filter(|text| !text.is_empty())
                    .map(|text| Ok(StreamChunk::content(text)))
            }
            Some("message_delta") => {
                let delta = match serde_json::from_str::<MessageDelta>(&frame.data) {
                    Ok(delta) => delta,
                    Err(e) => return Some(Err(AIError::parse(format!("message_delta: {}", e)))),
                };
                self.finished = true;
                let finish_reason = match delta.delta.stop_reason.as_deref() {
                    Some("max_tokens") => FinishReason::Length,
                    _ => FinishReason::Stop,
                };
                let usage = delta
                    .usage
                    .map(|u| {
                        TokenUsage::new(
                            u.input_tokens.unwrap_or(self.input_tokens),
                            u.output_tokens.unwrap_or(0),
                        )
                    })
                    .unwrap_or_else(|| TokenUsage::new(self.input_tokens, 0));
                Some(Ok(StreamChunk::final_chunk(finish_reason, usage)))
            }
            Some("message_stop") => {
                self.finished = true;
                None
            }
            Some("error") => {
                self.finished = true;
                let error = serde_json::from_str::<StreamError>(&frame.data)
                    .map(|e| e.error)
                    .unwrap_or_default();
                Some(Err(match error.error_type.as_deref() {
                    Some("overloaded_error") => AIError::Overloaded,
                    Some("rate_limit_error") => AIError::rate_limited(60),
                    Some("authentication_error") | Some("permission_error") => {
                        AIError::AuthenticationFailed
                    }
                    _ => AIError::unavailable(
                        error.message.unwrap_or_else(|| "Stream error".to_string()),
                    ),
                }))
            }
            // content_block_start/stop, ping
            _ => None,
        }
    }
}

// ----- Anthropic API Types -----

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageStart {
    message: MessageStartContent,
}

#[derive(Debug, Deserialize)]
struct MessageStartContent {
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: TextDelta,
}

#[derive(Debug, Deserialize)]
struct TextDelta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    error: StreamErrorContent,
}

#[derive(Debug, Default, Deserialize)]
struct StreamErrorContent {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::Message;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;
    use futures::StreamExt;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new(AnthropicConfig::new("test-key")).unwrap()
    }

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    #[test]
    fn config_builder_works() {
        let config = AnthropicConfig::new("test-key")
            .with_model("claude-3-5-haiku-latest")
            .with_base_url("https://custom.api.com/")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5)
            .with_max_tokens(256);

        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn config_debug_does_not_leak_key() {
        let config = AnthropicConfig::new("sk-ant-secret");
        assert!(!format!("{:?}", config).contains("sk-ant-secret"));
    }

    #[test]
    fn provider_info_reports_model() {
        let info = provider().provider_info();
        assert_eq!(info.name, "anthropic");
        assert_eq!(info.model, "claude-sonnet-4-20250514");
    }

    // ─── Request Mapping ─────────────────────────────────────────────

    #[test]
    fn request_drops_leading_assistant_turns() {
        let request = CompletionRequest::new("r1")
            .with_messages(vec![
                Message::assistant("earlier reply"),
                Message::user("question"),
                Message::assistant("answer"),
            ])
            .with_system_prompt("persona");

        let body = provider().to_anthropic_request(&request).unwrap();
        let roles: Vec<_> = body.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant"]);
        assert_eq!(body.system.as_deref(), Some("persona"));
        assert_eq!(body.max_tokens, 1024);
        assert!(body.stream);
    }

    #[test]
    fn request_without_user_turn_is_invalid() {
        let request =
            CompletionRequest::new("r1").with_messages(vec![Message::assistant("hello")]);
        assert!(matches!(
            provider().to_anthropic_request(&request),
            Err(AIError::InvalidRequest(_))
        ));
    }

    // ─── Status Mapping ──────────────────────────────────────────────

    #[test]
    fn status_codes_map_to_error_classes() {
        assert!(matches!(error_for_status(401, "", None), AIError::AuthenticationFailed));
        assert!(matches!(error_for_status(403, "", None), AIError::AuthenticationFailed));
        assert!(matches!(
            error_for_status(429, "", Some(12)),
            AIError::RateLimited { retry_after_secs: 12 }
        ));
        assert!(matches!(error_for_status(529, "", None), AIError::Overloaded));
        assert!(matches!(error_for_status(500, "", None), AIError::Unavailable { .. }));
        assert!(matches!(error_for_status(400, "bad", None), AIError::InvalidRequest(_)));
    }

    // ─── SSE Event Parsing ───────────────────────────────────────────

    #[test]
    fn parse_content_delta() {
        let chunk = AnthropicEventParser::default().parse(&frame(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
        ))
        .unwrap()
        .unwrap();

        assert_eq!(chunk.delta, "Hello");
        assert!(!chunk.is_final());
    }

    #[test]
    fn parse_message_delta_with_usage() {
        let chunk = AnthropicEventParser::default().parse(&frame(
            "message_delta",
            r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":50}}"#,
        ))
        .unwrap()
        .unwrap();

        assert!(chunk.is_final());
        assert_eq!(chunk.finish_reason, Some(FinishReason::Length));
        assert_eq!(chunk.usage.unwrap().completion_tokens, 50);
    }

    #[test]
    fn parse_overloaded_error_event() {
        let result = AnthropicEventParser::default().parse(&frame(
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ))
        .unwrap();
        assert!(matches!(result, Err(AIError::Overloaded)));
    }

    #[test]
    fn prompt_tokens_from_message_start_reach_final_chunk() {
        let mut parser = AnthropicEventParser::default();
        assert!(parser
            .parse(&frame(
                "message_start",
                r#"{"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":321,"output_tokens":1}}}"#,
            ))
            .is_none());

        let chunk = parser
            .parse(&frame(
                "message_delta",
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":12}}"#,
            ))
            .unwrap()
            .unwrap();

        let usage = chunk.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 321);
        assert_eq!(usage.completion_tokens, 12);
        assert_eq!(usage.total_tokens, 333);
    }

    #[test]
    fn parser_tracks_end_of_message() {
        let mut parser = AnthropicEventParser::default();
        parser.parse(&frame(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        ));
        assert!(!parser.finished);

        parser.parse(&frame("message_stop", r#"{"type":"message_stop"}"#));
        assert!(parser.finished);
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        assert_eq!(backoff(0), Duration::from_secs(1));
        assert_eq!(backoff(1), Duration::from_secs(2));
        assert_eq!(backoff(2), Duration::from_secs(4));
        assert_eq!(backoff(10), Duration::from_secs(MAX_BACKOFF_SECS));
        assert_eq!(backoff(64), Duration::from_secs(MAX_BACKOFF_SECS));
        assert_eq!(backoff(u32::MAX), Duration::from_secs(MAX_BACKOFF_SECS));
    }

    #[test]
    fn bookkeeping_events_are_skipped() {
        assert!(AnthropicEventParser::default().parse(&frame("ping", "{}")).is_none());
        assert!(AnthropicEventParser::default().parse(&frame("message_stop", r#"{"type":"message_stop"}"#)).is_none());
    }

    // ─── Against a Local Server ──────────────────────────────────────

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn streams_deltas_from_server() {
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n",
            "event: message_delta\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":2}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        let router = Router::new().route(
            "/v1/messages",
            post(move || async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }),
        );
        let base_url = serve(router).await;

        let provider = AnthropicProvider::new(AnthropicConfig::new("k").with_base_url(base_url)).unwrap();
        let request = CompletionRequest::new("r1").with_messages(vec![Message::user("Hi")]);

        let chunks: Vec<_> = provider
            .stream_complete(request)
            .await
            .unwrap()
            .collect()
            .await;

        let deltas: Vec<_> = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().delta.clone())
            .filter(|d| !d.is_empty())
            .collect();
        assert_eq!(deltas, vec!["Hel", "lo"]);
        assert!(chunks.last().unwrap().as_ref().unwrap().is_final());
    }

    #[tokio::test]
    async fn body_closed_before_message_stop_ends_with_error() {
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"The store opens at\"}}\n\n",
        );
        let router = Router::new().route(
            "/v1/messages",
            post(move || async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }),
        );
        let base_url = serve(router).await;

        let provider = AnthropicProvider::new(AnthropicConfig::new("k").with_base_url(base_url)).unwrap();
        let request = CompletionRequest::new("r1").with_messages(vec![Message::user("Hi")]);

        let chunks: Vec<_> = provider
            .stream_complete(request)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().delta, "The store opens at");
        assert!(matches!(chunks[1], Err(AIError::Network(_))));
    }

    #[tokio::test]
    async fn unauthorized_response_fails_without_retry() {
        let router = Router::new().route(
            "/v1/messages",
            post(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
                )
                    .into_response()
            }),
        );
        let base_url = serve(router).await;

        let provider = AnthropicProvider::new(AnthropicConfig::new("bad").with_base_url(base_url)).unwrap();
        let request = CompletionRequest::new("r1").with_messages(vec![Message::user("Hi")]);

        let err = match provider.stream_complete(request).await {
            Err(err) => err,
            Ok(_) => panic!("expected authentication failure"),
        };
        assert!(matches!(err, AIError::AuthenticationFailed));
    }
}
