//! System instruction assembly.

use std::collections::HashMap;

/// Builds the system instruction sent with every upstream call.
///
/// Persona and knowledge-base text are opaque content; the composer only
/// decides their order and appends the language directive.
#[derive(Debug, Clone, Default)]
pub struct SystemPromptComposer {
    persona: String,
    knowledge_base: String,
    language_instructions: HashMap<String, String>,
    default_language: String,
}

impl SystemPromptComposer {
    pub fn new(
        persona: impl Into<String>,
        knowledge_base: impl Into<String>,
        language_instructions: HashMap<String, String>,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            persona: persona.into(),
            knowledge_base: knowledge_base.into(),
            language_instructions,
            default_language: default_language.into(),
        }
    }

    /// Directive for `language`, falling back to the default language.
    pub fn language_directive(&self, language: Option<&str>) -> Option<&str> {
        language
            .and_then(|lang| self.language_instructions.get(lang))
            .or_else(|| self.language_instructions.get(&self.default_language))
            .map(String::as_str)
    }

    /// Composes the full instruction for a request in `language`.
    pub fn compose(&self, language: Option<&str>) -> String {
        let mut sections: Vec<&str> = Vec::with_capacity(3);

        if !self.persona.trim().is_empty() {
            sections.push(self.persona.trim());
        }
        if !self.knowledge_base.trim().is_empty() {
            sections.push(self.knowledge_base.trim());
        }
        if let Some(directive) = self.language_directive(language) {
            sections.push(directive);
        }

        sections.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer() -> SystemPromptComposer {
        let mut instructions = HashMap::new();
        instructions.insert("en".to_string(), "Respond in English.".to_string());
        instructions.insert("es".to_string(), "Responde en español.".to_string());
        SystemPromptComposer::new("You are a shop assistant.", "Opening hours: 9-5.", instructions, "en")
    }

    #[test]
    fn composes_persona_knowledge_and_directive_in_order() {
        let prompt = composer().compose(Some("es"));
        assert_eq!(
            prompt,
            "You are a shop assistant.\n\nOpening hours: 9-5.\n\nResponde en español."
        );
    }

    #[test]
    fn unknown_language_falls_back_to_default() {
        assert_eq!(
            composer().language_directive(Some("xx")),
            Some("Respond in English.")
        );
        assert_eq!(composer().language_directive(None), Some("Respond in English."));
    }

    #[test]
    fn empty_sections_are_skipped() {
        let c = SystemPromptComposer::new("", "  ", HashMap::new(), "en");
        assert_eq!(c.compose(Some("en")), "");
    }
}
