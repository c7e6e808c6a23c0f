//! Domain layer containing the widget's pure types and rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (timestamps, state machine trait)
//! - `chat` - Relay-side conversation types: messages, validation, trimming, stream events
//! - `widget` - Client-side view and request lifecycle types

pub mod chat;
pub mod foundation;
pub mod widget;
