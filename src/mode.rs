//! Chooses between one-shot and interactive operation.

use std::io::{self, IsTerminal, Read};

use crate::error::{Error, Result};

/// How shellm runs for this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read stdin to its end, answer once, exit.
    OneShot,
    /// Chat until the user quits.
    Interactive,
}

impl Mode {
    /// Interactive when stdin is a terminal, one-shot otherwise.
    pub fn detect(stdin_is_terminal: bool) -> Self {
        if stdin_is_terminal {
            Mode::Interactive
        } else {
            Mode::OneShot
        }
    }

    /// Inspects the process's stdin.
    pub fn from_stdin() -> Self {
        Self::detect(io::stdin().is_terminal())
    }
}

/// Reads all of `reader` as UTF-8 text.
///
/// # Errors
///
/// Fails if the read fails or the content is not valid UTF-8.
pub fn read_piped<R: Read>(mut reader: R) -> Result<String> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| Error::io("failed to read piped input", e))?;
    String::from_utf8(bytes).map_err(|e| {
        let err = e.utf8_error();
        Error::encoding(format!("piped input is not UTF-8: {err}"), Some(Box::new(err)))
    })
}
