//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - Upstream model providers (Anthropic, mock)
//! - `http` - Axum router serving the relay
//! - `rate_limiter` - In-memory fixed-window limiter and its cleanup task
//! - `sse` - Server-sent event frame decoding
//! - `transport` - Client connection to the relay

pub mod ai;
pub mod http;
pub mod rate_limiter;
pub mod sse;
pub mod transport;

pub use ai::{AnthropicConfig, AnthropicProvider, MockAIProvider};
pub use http::{app_router, ChatAppState};
pub use rate_limiter::{InMemoryRateLimiter, RateLimitCleanup, RateLimitConfig};
pub use transport::HttpChatTransport;
