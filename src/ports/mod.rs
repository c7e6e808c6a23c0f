//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `RateLimiter` - per-caller admission for the relay
//! - `AIProvider` - streaming text generation upstream
//! - `ChatTransport` - the widget's connection to the relay

mod ai_provider;
mod chat_transport;
mod rate_limiter;

pub use ai_provider::{
    AIError, AIProvider, ChunkStream, CompletionRequest, FinishReason, ProviderInfo, StreamChunk,
    TokenUsage,
};
pub use chat_transport::{ChatRequest, ChatTransport, EventStream, TransportError};
pub use rate_limiter::{
    CallerKey, RateLimitDenied, RateLimitError, RateLimitResult, RateLimitStatus, RateLimiter,
};
