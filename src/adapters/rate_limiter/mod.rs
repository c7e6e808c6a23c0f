//! Rate limiter adapters.
//!
//! ## Available Adapters
//!
//! - `InMemoryRateLimiter` - process-local fixed windows for a single instance
//! - `RateLimitCleanup` - periodic purge of expired windows
//!
//! ## Usage
//!
//! ```ignore
//! use chat_widget::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitCleanup, RateLimitConfig};
//!
//! let limiter = Arc::new(InMemoryRateLimiter::new(RateLimitConfig::default()));
//! let cleanup = RateLimitCleanup::new(limiter.clone()).spawn(shutdown_rx);
//! ```

mod cleanup;
mod config;
mod in_memory;

pub use cleanup::RateLimitCleanup;
pub use config::RateLimitConfig;
pub use in_memory::InMemoryRateLimiter;
