//! The system instruction handed to every conversational session.

/// The fixed system instruction used by both modes.
pub const SYSTEM_PROMPT: &str = "You are a general purpose AI chat bot. Output in markdown.";

/// Heading that delimits supplementary context from the system instruction.
const CONTEXT_HEADING: &str = "Context:";

/// An immutable system instruction, optionally extended with context text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    system: String,
    context: Option<String>,
}

impl PromptContext {
    /// Creates a prompt context from a system instruction with no context.
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            context: None,
        }
    }

    /// Attaches supplementary context.  Empty context is treated as absent.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    /// Returns the supplementary context, if any.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Renders the full system prompt sent to the backend.
    pub fn system_prompt(&self) -> String {
        match &self.context {
            Some(context) => format!("{}\n{CONTEXT_HEADING}\n{context}", self.system),
            None => self.system.clone(),
        }
    }
}

impl Default for PromptContext {
    fn default() -> Self {
        Self::new(SYSTEM_PROMPT)
    }
}
