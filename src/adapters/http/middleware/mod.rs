//! HTTP middleware for axum.
//!
//! This module contains middleware layers for cross-cutting concerns:
//!
//! - `rate_limit` - Per-caller admission and rate limit headers
//! - `cors` - Origin allow-list and preflight handling

pub mod cors;
pub mod rate_limit;

pub use cors::{build_cors_layer, preflight_no_content};
pub use rate_limit::{extract_client_ip, headers, rate_limit_middleware, RateLimiterState};
