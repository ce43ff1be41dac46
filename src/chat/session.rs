//! The interactive chat loop.
//!
//! [`ChatLoop`] owns one backend session for its whole run.  It reads a line,
//! intercepts commands, and otherwise streams one generation through the
//! renderer before reading the next line.

use crate::backend::{Backend, Conversation};
use crate::chat::commands::{ChatCommand, FAREWELL, help_text, parse_command};
use crate::chat::input::{InputEvent, LineSource};
use crate::config::GenerationSettings;
use crate::error::Result;
use crate::observability::{CHAT_COMMANDS, CHAT_TURNS};
use crate::prompt::PromptContext;
use crate::render::{Renderer, render_stream};

/// The prompt shown before each line of input.
pub const INPUT_PROMPT: &str = ">> ";

/// States of the chat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    /// Created, session not yet open.
    Init,
    /// Waiting for the next line of input.
    AwaitingInput,
    /// Streaming one response.
    Generating,
    /// The loop has ended.
    Terminated,
}

/// How the chat loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatExit {
    /// The user quit, by command or end of input.
    Quit,
    /// Ctrl-C was pressed at the prompt.  Treated like an interrupt signal.
    Interrupted,
}

/// Interactive loop over a single conversational session.
pub struct ChatLoop<'a, B: Backend> {
    backend: &'a B,
    prompt: PromptContext,
    settings: GenerationSettings,
    state: ChatState,
}

impl<'a, B: Backend> ChatLoop<'a, B> {
    /// Creates a chat loop that will open its session on `backend`.
    pub fn new(backend: &'a B, prompt: PromptContext, settings: GenerationSettings) -> Self {
        Self {
            backend,
            prompt,
            settings,
            state: ChatState::Init,
        }
    }

    /// The current state.
    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Runs the loop until the user quits.
    ///
    /// Generation failures are reported through `renderer` and the loop keeps
    /// going.  The session is released when this returns, on every path.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or input cannot be read.
    pub async fn run<I, R>(&mut self, input: &mut I, renderer: &mut R) -> Result<ChatExit>
    where
        I: LineSource + ?Sized,
        R: Renderer + ?Sized,
    {
        let mut session = match self.backend.open_session(&self.prompt.system_prompt()) {
            Ok(session) => session,
            Err(err) => {
                self.transition(ChatState::Terminated);
                return Err(err);
            }
        };
        tracing::debug!(context = self.prompt.context().is_some(), "chat session opened");
        self.transition(ChatState::AwaitingInput);

        let exit = loop {
            let line = match input.read_line(INPUT_PROMPT) {
                Ok(InputEvent::Line(line)) => line,
                Ok(InputEvent::Eof) => {
                    renderer.print_info(FAREWELL);
                    break ChatExit::Quit;
                }
                Ok(InputEvent::Interrupted) => break ChatExit::Interrupted,
                Err(err) => {
                    self.transition(ChatState::Terminated);
                    return Err(err);
                }
            };

            match parse_command(&line) {
                Some(ChatCommand::Quit) => {
                    CHAT_COMMANDS.click();
                    renderer.print_info(FAREWELL);
                    break ChatExit::Quit;
                }
                Some(ChatCommand::Help) => {
                    CHAT_COMMANDS.click();
                    renderer.print_info(help_text());
                    continue;
                }
                None if line.trim().is_empty() => continue,
                None => {}
            }

            self.transition(ChatState::Generating);
            CHAT_TURNS.click();
            let stream = session.generate(&line, self.settings.max_tokens);
            if let Err(err) = render_stream(
                renderer,
                stream,
                self.settings.refresh_delay,
                self.settings.sink.as_ref(),
            )
            .await
            {
                renderer.print_error(&err.to_string());
            }
            self.transition(ChatState::AwaitingInput);
        };

        self.transition(ChatState::Terminated);
        session.close();
        Ok(exit)
    }

    fn transition(&mut self, next: ChatState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "chat state");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::scripted::ScriptedBackend;
    use crate::chat::ScriptedInput;
    use crate::render::tests::RecordingRenderer;
    use crate::sink::CaptureSink;

    fn settings(sink: Option<CaptureSink>) -> GenerationSettings {
        GenerationSettings {
            max_tokens: 1024,
            refresh_delay: Duration::ZERO,
            sink,
        }
    }

    #[tokio::test]
    async fn quit_first_prints_farewell_only() {
        let backend = ScriptedBackend::new();
        let mut input = ScriptedInput::lines(&["q", "never read"]);
        let mut renderer = RecordingRenderer::default();

        let mut chat = ChatLoop::new(&backend, PromptContext::default(), settings(None));
        assert_eq!(chat.state(), ChatState::Init);
        let exit = chat.run(&mut input, &mut renderer).await.unwrap();

        assert_eq!(exit, ChatExit::Quit);
        assert_eq!(chat.state(), ChatState::Terminated);
        assert_eq!(renderer.info, vec![FAREWELL.to_string()]);
        assert!(renderer.frames.is_empty());
        assert!(backend.generations().is_empty());
        assert_eq!(input.reads, 1);
        assert_eq!(backend.opened(), 1);
        assert_eq!(backend.closed(), 1);
    }

    #[tokio::test]
    async fn help_neither_generates_nor_renders() {
        let backend = ScriptedBackend::new().with_reply(&["hi"]);
        let mut input = ScriptedInput::lines(&["h", "/help", "q"]);
        let mut renderer = RecordingRenderer::default();

        let mut chat = ChatLoop::new(&backend, PromptContext::default(), settings(None));
        chat.run(&mut input, &mut renderer).await.unwrap();

        assert!(backend.generations().is_empty());
        assert!(renderer.frames.is_empty());
        assert_eq!(renderer.finishes, 0);
        assert_eq!(
            renderer.info,
            vec![
                help_text().to_string(),
                help_text().to_string(),
                FAREWELL.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn turns_share_one_session_and_append_to_sink_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CaptureSink::new(dir.path().join("chat.md"));
        let backend = ScriptedBackend::new()
            .with_reply(&["first ", "answer"])
            .with_reply(&["second"]);
        let mut input = ScriptedInput::lines(&["one", "two", "q"]);
        let mut renderer = RecordingRenderer::default();

        let mut chat = ChatLoop::new(&backend, PromptContext::default(), settings(Some(sink.clone())));
        chat.run(&mut input, &mut renderer).await.unwrap();

        assert_eq!(backend.opened(), 1);
        assert_eq!(backend.closed(), 1);
        assert_eq!(
            backend.generations(),
            vec![("one".to_string(), 1024), ("two".to_string(), 1024)]
        );
        assert_eq!(std::fs::read_to_string(sink.path()).unwrap(), "first answersecond");
        // The second generation starts from an empty buffer.
        assert_eq!(
            renderer.frames,
            vec!["first ".to_string(), "first answer".to_string(), "second".to_string()]
        );
    }

    #[tokio::test]
    async fn generation_failure_returns_to_prompt() {
        let backend = ScriptedBackend::new()
            .with_failure(&["par"], "connection reset")
            .with_reply(&["ok"]);
        let mut input = ScriptedInput::lines(&["one", "two", "q"]);
        let mut renderer = RecordingRenderer::default();

        let mut chat = ChatLoop::new(&backend, PromptContext::default(), settings(None));
        let exit = chat.run(&mut input, &mut renderer).await.unwrap();

        assert_eq!(exit, ChatExit::Quit);
        assert_eq!(renderer.errors.len(), 1);
        assert!(renderer.errors[0].contains("connection reset"));
        assert_eq!(backend.generations().len(), 2);
        assert_eq!(renderer.frames.last().map(String::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn eof_ends_like_quit() {
        let backend = ScriptedBackend::new();
        let mut input = ScriptedInput::lines(&[]);
        let mut renderer = RecordingRenderer::default();

        let mut chat = ChatLoop::new(&backend, PromptContext::default(), settings(None));
        let exit = chat.run(&mut input, &mut renderer).await.unwrap();

        assert_eq!(exit, ChatExit::Quit);
        assert_eq!(renderer.info, vec![FAREWELL.to_string()]);
        assert_eq!(backend.closed(), 1);
    }

    #[tokio::test]
    async fn interrupt_at_prompt_stops_without_farewell() {
        let backend = ScriptedBackend::new();
        let mut input = ScriptedInput::events(vec![InputEvent::Interrupted]);
        let mut renderer = RecordingRenderer::default();

        let mut chat = ChatLoop::new(&backend, PromptContext::default(), settings(None));
        let exit = chat.run(&mut input, &mut renderer).await.unwrap();

        assert_eq!(exit, ChatExit::Interrupted);
        assert!(renderer.info.is_empty());
        assert!(backend.generations().is_empty());
    }

    #[tokio::test]
    async fn blank_lines_are_ignored() {
        let backend = ScriptedBackend::new();
        let mut input = ScriptedInput::lines(&["", "   ", "q"]);
        let mut renderer = RecordingRenderer::default();

        let mut chat = ChatLoop::new(&backend, PromptContext::default(), settings(None));
        chat.run(&mut input, &mut renderer).await.unwrap();

        assert!(backend.generations().is_empty());
        assert_eq!(input.reads, 3);
    }

    #[tokio::test]
    async fn session_uses_context_in_system_prompt() {
        let backend = ScriptedBackend::new();
        let mut input = ScriptedInput::lines(&["q"]);
        let mut renderer = RecordingRenderer::default();
        let prompt = PromptContext::new("sys").with_context("notes");

        let mut chat = ChatLoop::new(&backend, prompt, settings(None));
        chat.run(&mut input, &mut renderer).await.unwrap();

        assert_eq!(backend.system_prompts(), vec!["sys\nContext:\nnotes".to_string()]);
    }

    #[tokio::test]
    async fn failed_open_terminates_without_reading() {
        struct Unavailable;
        impl Backend for Unavailable {
            type Session = crate::backend::scripted::ScriptedSession;
            fn open_session(&self, _system_prompt: &str) -> Result<Self::Session> {
                Err(crate::error::Error::generation("no server", None))
            }
        }

        let mut input = ScriptedInput::lines(&["hello"]);
        let mut renderer = RecordingRenderer::default();
        let mut chat = ChatLoop::new(&Unavailable, PromptContext::default(), settings(None));
        assert!(chat.run(&mut input, &mut renderer).await.is_err());
        assert_eq!(chat.state(), ChatState::Terminated);
        assert_eq!(input.reads, 0);
    }
}
