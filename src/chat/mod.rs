//! Interactive chat over a single backend session.
//!
//! - [`commands`]: the quit and help sentinels
//! - [`input`]: line editing through `rustyline`
//! - [`session`]: the read, dispatch, render loop

mod commands;
mod input;
mod session;

pub use commands::{ChatCommand, FAREWELL, help_text, parse_command};
pub use input::{InputEvent, LineSource, RustylineInput};
pub use session::{ChatExit, ChatLoop, ChatState, INPUT_PROMPT};

#[cfg(test)]
pub(crate) use input::tests::ScriptedInput;
