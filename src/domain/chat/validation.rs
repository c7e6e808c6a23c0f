//! Structural and size validation of incoming chat payloads.
//!
//! Rules are checked in order and the first failure wins:
//!
//! 1. the payload carries a non-empty list of messages
//! 2. the list does not exceed `max_messages`
//! 3. every message has a known role and text content of at most
//!    `max_message_chars` characters
//!
//! Validation is pure. It never touches the rate limiter or the provider.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::message::{Message, MessageRole};

/// Size bounds applied to conversations arriving at the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLimits {
    /// Maximum number of messages accepted in one request.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Maximum characters per message content.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    /// Number of most recent messages forwarded upstream.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            max_message_chars: default_max_message_chars(),
            context_window: default_context_window(),
        }
    }
}

fn default_max_messages() -> usize {
    50
}

fn default_max_message_chars() -> usize {
    4000
}

fn default_context_window() -> usize {
    20
}

/// Chat payload as received, before any structural checks.
///
/// `messages` stays untyped so every structural problem maps to a
/// specific [`ValidationError`] instead of a generic parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub messages: Option<serde_json::Value>,
    #[serde(default)]
    pub language: Option<String>,
}

/// A request that passed every validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// Conversation history, oldest first.
    pub messages: Vec<Message>,
    /// Normalised language hint, if the caller sent one.
    pub language: Option<String>,
}

/// Reasons a chat payload is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Request body is not valid JSON: {0}")]
    MalformedBody(String),

    #[error("messages must be a non-empty array")]
    MissingMessages,

    #[error("Too many messages: {actual} exceeds the limit of {max}")]
    TooManyMessages { max: usize, actual: usize },

    #[error("Message {index} has an invalid role; expected \"user\" or \"assistant\"")]
    InvalidRole { index: usize },

    #[error("Message {index} content must be text")]
    InvalidContent { index: usize },

    #[error("Message {index} exceeds the maximum length of {max} characters")]
    MessageTooLong { index: usize, max: usize },
}

impl ValidationError {
    /// Stable error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MalformedBody(_) => "MALFORMED_BODY",
            ValidationError::MissingMessages => "MISSING_MESSAGES",
            ValidationError::TooManyMessages { .. } => "TOO_MANY_MESSAGES",
            ValidationError::InvalidRole { .. } => "INVALID_ROLE",
            ValidationError::InvalidContent { .. } => "INVALID_CONTENT",
            ValidationError::MessageTooLong { .. } => "MESSAGE_TOO_LONG",
        }
    }
}

/// Maximum accepted length of a language hint; longer values are ignored.
const MAX_LANGUAGE_LEN: usize = 16;

/// Validates chat payloads against [`ChatLimits`].
#[derive(Debug, Clone, Copy)]
pub struct RequestValidator {
    limits: ChatLimits,
}

impl RequestValidator {
    pub fn new(limits: ChatLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ChatLimits {
        &self.limits
    }

    /// Checks the payload and converts it into typed messages.
    pub fn validate(&self, payload: &ChatPayload) -> Result<ValidatedRequest, ValidationError> {
        let items = match payload.messages.as_ref().and_then(|v| v.as_array()) {
            Some(items) if !items.is_empty() => items,
            _ => return Err(ValidationError::MissingMessages),
        };

        if items.len() > self.limits.max_messages {
            return Err(ValidationError::TooManyMessages {
                max: self.limits.max_messages,
                actual: items.len(),
            });
        }

        let mut messages = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let role = item
                .get("role")
                .and_then(|r| r.as_str())
                .and_then(|r| r.parse::<MessageRole>().ok())
                .ok_or(ValidationError::InvalidRole { index })?;

            let content = item
                .get("content")
                .and_then(|c| c.as_str())
                .ok_or(ValidationError::InvalidContent { index })?;

            if content.chars().count() > self.limits.max_message_chars {
                return Err(ValidationError::MessageTooLong {
                    index,
                    max: self.limits.max_message_chars,
                });
            }

            messages.push(Message::new(role, content));
        }

        Ok(ValidatedRequest {
            messages,
            language: normalize_language(payload.language.as_deref()),
        })
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(ChatLimits::default())
    }
}

fn normalize_language(raw: Option<&str>) -> Option<String> {
    let lang = raw?.trim().to_lowercase();
    if lang.is_empty() || lang.len() > MAX_LANGUAGE_LEN {
        None
    } else {
        Some(lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn limits(max_messages: usize, max_message_chars: usize) -> ChatLimits {
        ChatLimits {
            max_messages,
            max_message_chars,
            context_window: max_messages,
        }
    }

    fn payload(messages: serde_json::Value) -> ChatPayload {
        ChatPayload {
            messages: Some(messages),
            language: Some("en".to_string()),
        }
    }

    fn user_messages(n: usize) -> serde_json::Value {
        json!((0..n)
            .map(|i| json!({"role": "user", "content": format!("m{}", i)}))
            .collect::<Vec<_>>())
    }

    #[test]
    fn accepts_minimal_single_message() {
        let validator = RequestValidator::default();
        let request = validator
            .validate(&payload(json!([{"role": "user", "content": "Hi"}])))
            .unwrap();

        assert_eq!(request.messages, vec![Message::user("Hi")]);
        assert_eq!(request.language, Some("en".to_string()));
    }

    #[test]
    fn rejects_missing_messages() {
        let validator = RequestValidator::default();
        let err = validator.validate(&ChatPayload::default()).unwrap_err();
        assert_eq!(err, ValidationError::MissingMessages);
    }

    #[test]
    fn rejects_empty_messages() {
        let validator = RequestValidator::default();
        let err = validator.validate(&payload(json!([]))).unwrap_err();
        assert_eq!(err, ValidationError::MissingMessages);
    }

    #[test]
    fn rejects_non_array_messages() {
        let validator = RequestValidator::default();
        let err = validator.validate(&payload(json!("hello"))).unwrap_err();
        assert_eq!(err, ValidationError::MissingMessages);
    }

    #[test]
    fn rejects_one_over_max_count() {
        let validator = RequestValidator::new(limits(5, 100));
        let err = validator.validate(&payload(user_messages(6))).unwrap_err();
        assert_eq!(err, ValidationError::TooManyMessages { max: 5, actual: 6 });
    }

    #[test]
    fn accepts_exactly_max_count() {
        let validator = RequestValidator::new(limits(5, 100));
        assert!(validator.validate(&payload(user_messages(5))).is_ok());
    }

    #[test]
    fn rejects_one_over_max_length() {
        let validator = RequestValidator::new(limits(5, 10));
        let err = validator
            .validate(&payload(json!([{"role": "user", "content": "x".repeat(11)}])))
            .unwrap_err();
        assert_eq!(err, ValidationError::MessageTooLong { index: 0, max: 10 });
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let validator = RequestValidator::new(limits(5, 3));
        assert!(validator
            .validate(&payload(json!([{"role": "user", "content": "ñéü"}])))
            .is_ok());
    }

    #[test]
    fn rejects_non_text_content() {
        let validator = RequestValidator::default();
        let err = validator
            .validate(&payload(json!([
                {"role": "user", "content": "ok"},
                {"role": "assistant", "content": 42}
            ])))
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidContent { index: 1 });
    }

    #[test]
    fn rejects_unknown_role() {
        let validator = RequestValidator::default();
        let err = validator
            .validate(&payload(json!([{"role": "system", "content": "hi"}])))
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidRole { index: 0 });
    }

    #[test]
    fn count_rule_wins_over_content_rule() {
        let validator = RequestValidator::new(limits(1, 1));
        let err = validator
            .validate(&payload(json!([
                {"role": "user", "content": "too long"},
                {"role": "user", "content": "too long"}
            ])))
            .unwrap_err();
        assert!(matches!(err, ValidationError::TooManyMessages { .. }));
    }

    #[test]
    fn language_is_normalised() {
        let validator = RequestValidator::default();
        let mut p = payload(user_messages(1));

        p.language = Some(" ES ".to_string());
        assert_eq!(validator.validate(&p).unwrap().language, Some("es".to_string()));

        p.language = Some("".to_string());
        assert_eq!(validator.validate(&p).unwrap().language, None);

        p.language = Some("x".repeat(40));
        assert_eq!(validator.validate(&p).unwrap().language, None);
    }

    #[test]
    fn error_codes_are_distinct() {
        let errors = [
            ValidationError::MalformedBody("x".into()),
            ValidationError::MissingMessages,
            ValidationError::TooManyMessages { max: 1, actual: 2 },
            ValidationError::InvalidRole { index: 0 },
            ValidationError::InvalidContent { index: 0 },
            ValidationError::MessageTooLong { index: 0, max: 1 },
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    proptest! {
        #[test]
        fn count_limit_is_enforced(max in 1usize..30, n in 1usize..60) {
            let validator = RequestValidator::new(limits(max, 100));
            let result = validator.validate(&payload(user_messages(n)));
            prop_assert_eq!(result.is_ok(), n <= max);
        }

        #[test]
        fn length_limit_is_enforced(max in 1usize..200, len in 0usize..400) {
            let validator = RequestValidator::new(limits(5, max));
            let result = validator.validate(&payload(json!([
                {"role": "user", "content": "a".repeat(len)}
            ])));
            prop_assert_eq!(result.is_ok(), len <= max);
        }
    }
}
