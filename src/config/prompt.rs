//! System prompt configuration

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::domain::chat::SystemPromptComposer;

use super::error::{ConfigError, ValidationError};

/// Persona, knowledge base and per-language directives.
///
/// The text is opaque content; only its assembly is defined here.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    /// Assistant persona, placed first in the system instruction
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Inline knowledge base text
    #[serde(default)]
    pub knowledge_base: String,

    /// Knowledge base file, read at startup; overrides `knowledge_base`
    pub knowledge_base_path: Option<PathBuf>,

    /// Language used when a request's hint has no directive
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Language code to directive; merged over the built-in set
    #[serde(default)]
    pub language_instructions: HashMap<String, String>,
}

impl PromptConfig {
    /// Built-in directives overridden by configured ones.
    pub fn language_instructions(&self) -> HashMap<String, String> {
        let mut instructions = default_language_instructions();
        instructions.extend(
            self.language_instructions
                .iter()
                .map(|(lang, directive)| (lang.to_lowercase(), directive.clone())),
        );
        instructions
    }

    /// Knowledge base text, from the file when one is configured.
    pub fn load_knowledge_base(&self) -> Result<String, ConfigError> {
        match &self.knowledge_base_path {
            Some(path) => std::fs::read_to_string(path).map_err(|source| {
                ConfigError::KnowledgeBase {
                    path: path.clone(),
                    source,
                }
            }),
            None => Ok(self.knowledge_base.clone()),
        }
    }

    /// Builds the composer used by the relay.
    pub fn composer(&self) -> Result<SystemPromptComposer, ConfigError> {
        let knowledge_base = self.load_knowledge_base()?;
        tracing::debug!(
            knowledge_base_chars = knowledge_base.chars().count(),
            default_language = %self.default_language,
            "Loaded system prompt content"
        );
        Ok(SystemPromptComposer::new(
            self.persona.clone(),
            knowledge_base,
            self.language_instructions(),
            self.default_language.to_lowercase(),
        ))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let default_language = self.default_language.to_lowercase();
        if !self.language_instructions().contains_key(&default_language) {
            return Err(ValidationError::MissingLanguageInstruction(default_language));
        }
        Ok(())
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            knowledge_base: String::new(),
            knowledge_base_path: None,
            default_language: default_language(),
            language_instructions: HashMap::new(),
        }
    }
}

fn default_persona() -> String {
    "You are the assistant in this website's chat widget. Answer briefly and helpfully, \
     using only the information provided below. If you do not know, say so."
        .to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_language_instructions() -> HashMap<String, String> {
    [
        ("en", "Always reply in English."),
        ("es", "Responde siempre en español."),
        ("fr", "Réponds toujours en français."),
        ("de", "Antworte immer auf Deutsch."),
    ]
    .into_iter()
    .map(|(lang, directive)| (lang.to_string(), directive.to_string()))
    .collect()
}
