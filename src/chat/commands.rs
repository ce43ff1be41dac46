//! In-band command parsing for the chat loop.
//!
//! A handful of reserved lines control the session and never reach the
//! model.  Both the bare single-letter forms and the slash forms are accepted.

/// The line printed when the chat loop ends.
pub const FAREWELL: &str = "Goodbye";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Exit the chat loop.
    Quit,
}

/// Parses user input for reserved commands.
///
/// Returns `Some(ChatCommand)` if the input is a sentinel, or `None` if it
/// should be sent to the model.
///
/// # Examples
///
/// ```
/// # use shellm::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("q"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
/// assert!(parse_command("quit smoking tips").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    match input.trim().to_lowercase().as_str() {
        "q" | "/q" | "/quit" | "/exit" => Some(ChatCommand::Quit),
        "h" | "/h" | "/help" | "/?" => Some(ChatCommand::Help),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Type a message and press Enter to send it to the model.
The conversation is remembered until you quit.

Available commands:
  h, /help      Show this help message
  q, /quit      Exit the chat
  Ctrl-D        Exit the chat
  Ctrl-C        Stop immediately, even mid-response"#
}
