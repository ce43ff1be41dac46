//! Line input for the chat loop.
//!
//! Wraps `rustyline` so the loop can be driven by a real terminal or by a
//! scripted source in tests.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::error::Result;

/// Events produced by a line source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// User submitted a line.
    Line(String),
    /// End of file (Ctrl-D).
    Eof,
    /// Ctrl-C pressed at the prompt.
    Interrupted,
}

/// A blocking source of user input lines.
pub trait LineSource {
    /// Shows `prompt` and blocks until the user submits a line.
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent>;
}

/// Terminal line editor with history.
pub struct RustylineInput {
    editor: DefaultEditor,
}

impl RustylineInput {
    /// Creates a line editor on the controlling terminal.
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineSource for RustylineInput {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(InputEvent::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(InputEvent::Eof),
            Err(err) => Err(err.into()),
        }
    }
}
