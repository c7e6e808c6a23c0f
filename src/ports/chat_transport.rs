//! Client-side port for opening a relay connection.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::domain::chat::{Message, StreamEvent};

/// Events read from one open relay connection.
///
/// Dropping the stream closes the connection.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, TransportError>> + Send>>;

/// Body sent to `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub language: String,
}

/// Port used by the conversation controller to reach the relay.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends the request and returns the relayed event stream.
    async fn open(&self, request: ChatRequest) -> Result<EventStream, TransportError>;
}

/// Failures opening or reading a relay connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The relay refused the request (HTTP 400 or similar).
    #[error("request rejected ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// The relay rate limited this caller.
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u32> },

    /// The connection could not be made or broke.
    #[error("network error: {0}")]
    Network(String),

    /// The relay sent something that is not a valid event stream.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Message shown to the visitor for this failure.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Rejected { reason, .. } => reason.clone(),
            TransportError::RateLimited { .. } => {
                "You're sending messages too quickly. Please wait a moment and try again."
                    .to_string()
            }
            TransportError::Network(_) | TransportError::Protocol(_) => {
                "Unable to reach the assistant. Please try again.".to_string()
            }
        }
    }
}
