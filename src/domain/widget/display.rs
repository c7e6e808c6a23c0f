//! Messages as rendered by the widget.

use serde::{Deserialize, Serialize};

use crate::domain::chat::{Message, MessageRole};
use crate::domain::foundation::Timestamp;

/// Rendering role of a displayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayRole {
    User,
    Assistant,
    /// In-progress assistant reply; at most one exists at a time.
    Streaming,
    /// Standalone error notice, never sent upstream.
    Error,
}

/// A message in the widget's display history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub role: DisplayRole,
    pub content: String,
    pub timestamp: Timestamp,
}

impl DisplayMessage {
    pub fn new(role: DisplayRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(DisplayRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(DisplayRole::Assistant, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(DisplayRole::Error, content)
    }

    /// Conversation entry sent to the relay, if this message is part of
    /// the conversation proper.
    pub fn to_outbound(&self) -> Option<Message> {
        match self.role {
            DisplayRole::User => Some(Message::new(MessageRole::User, self.content.clone())),
            DisplayRole::Assistant => {
                Some(Message::new(MessageRole::Assistant, self.content.clone()))
            }
            DisplayRole::Streaming | DisplayRole::Error => None,
        }
    }
}
