//! HTTP transport from the widget to the relay.

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;

use crate::adapters::sse::sse_frames;
use crate::domain::chat::StreamEvent;
use crate::ports::{ChatRequest, ChatTransport, EventStream, TransportError};

/// Opens `POST {base_url}/api/chat` and decodes the event stream.
#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpChatTransport {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Uses an existing client, e.g. one with custom timeouts.
    pub fn with_client(client: Client, base_url: impl AsRef<str>) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/chat", base_url.as_ref().trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open(&self, request: ChatRequest) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(TransportError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                });
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        let events = sse_frames(response.bytes_stream()).map(|frame| match frame {
            Ok(frame) => serde_json::from_str::<StreamEvent>(&frame.data)
                .map_err(|e| TransportError::Protocol(format!("invalid event: {}", e))),
            Err(e) => Err(TransportError::Network(e.to_string())),
        });

        Ok(Box::pin(events))
    }
}
