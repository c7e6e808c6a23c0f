//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Cannot read knowledge base {path}: {source}")]
    KnowledgeBase {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Temperature must be between 0.0 and 1.0")]
    InvalidTemperature,

    #[error("Rate limit {0} must be greater than zero")]
    InvalidRateLimit(&'static str),

    #[error("Chat limit {0} must be greater than zero")]
    InvalidChatLimit(&'static str),

    #[error("Context window ({context_window}) exceeds max messages ({max_messages})")]
    ContextWindowTooLarge {
        context_window: usize,
        max_messages: usize,
    },

    #[error("No instruction configured for default language '{0}'")]
    MissingLanguageInstruction(String),
}
