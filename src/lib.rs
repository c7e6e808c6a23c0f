//! Chat Widget - Streaming relay and conversation controller for an
//! embeddable AI chat widget.
//!
//! The relay (`POST /api/chat`) validates and rate limits conversations,
//! trims them to a context window and streams the model's reply back as
//! server-sent events. The conversation controller is the widget-side state
//! machine that consumes that stream.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
