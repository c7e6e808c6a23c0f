//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `CHAT_WIDGET` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use chat_widget::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod ai;
mod error;
mod prompt;
mod server;

pub use ai::AiConfig;
pub use error::{ConfigError, ValidationError};
pub use prompt::PromptConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

use crate::adapters::rate_limiter::RateLimitConfig;
use crate::application::RelaySettings;
use crate::domain::chat::ChatLimits;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, CORS)
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream model configuration
    #[serde(default)]
    pub ai: AiConfig,

    /// Per-caller request limits
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Conversation size limits
    #[serde(default)]
    pub chat: ChatLimits,

    /// System prompt content
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CHAT_WIDGET` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CHAT_WIDGET__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `CHAT_WIDGET__RATE_LIMIT__MAX_REQUESTS=20` -> `rate_limit.max_requests = 20`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CHAT_WIDGET")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid value found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.ai.validate()?;
        self.validate_rate_limit()?;
        self.validate_chat()?;
        self.prompt.validate()?;
        Ok(())
    }

    fn validate_rate_limit(&self) -> Result<(), ValidationError> {
        if self.rate_limit.max_requests == 0 {
            return Err(ValidationError::InvalidRateLimit("max_requests"));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ValidationError::InvalidRateLimit("window_secs"));
        }
        if self.rate_limit.cleanup_interval_secs == 0 {
            return Err(ValidationError::InvalidRateLimit("cleanup_interval_secs"));
        }
        Ok(())
    }

    fn validate_chat(&self) -> Result<(), ValidationError> {
        let chat = &self.chat;
        if chat.max_messages == 0 {
            return Err(ValidationError::InvalidChatLimit("max_messages"));
        }
        if chat.max_message_chars == 0 {
            return Err(ValidationError::InvalidChatLimit("max_message_chars"));
        }
        if chat.context_window == 0 {
            return Err(ValidationError::InvalidChatLimit("context_window"));
        }
        if chat.context_window > chat.max_messages {
            return Err(ValidationError::ContextWindowTooLarge {
                context_window: chat.context_window,
                max_messages: chat.max_messages,
            });
        }
        Ok(())
    }

    /// Generation settings for the relay.
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            context_window: self.chat.context_window,
            max_tokens: self.ai.max_tokens,
            temperature: self.ai.temperature,
        }
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
