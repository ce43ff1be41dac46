//! An in-memory backend that replays prepared replies and records every call.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::stream;

use super::{Backend, Conversation, TokenStream};
use crate::error::{Error, Result};

#[derive(Default)]
struct Script {
    replies: VecDeque<Vec<Result<String>>>,
    system_prompts: Vec<String>,
    generations: Vec<(String, u32)>,
    opened: usize,
    closed: usize,
}

/// Replays one prepared reply per generation, in order.
#[derive(Clone, Default)]
pub(crate) struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues a reply made of `fragments`.
    pub(crate) fn with_reply(self, fragments: &[&str]) -> Self {
        let reply = fragments.iter().map(|f| Ok(f.to_string())).collect();
        self.script.lock().unwrap().replies.push_back(reply);
        self
    }

    /// Queues a reply that yields `fragments` and then fails.
    pub(crate) fn with_failure(self, fragments: &[&str], message: &str) -> Self {
        let mut reply: Vec<Result<String>> = fragments.iter().map(|f| Ok(f.to_string())).collect();
        reply.push(Err(Error::generation(message, None)));
        self.script.lock().unwrap().replies.push_back(reply);
        self
    }

    pub(crate) fn opened(&self) -> usize {
        self.script.lock().unwrap().opened
    }

    pub(crate) fn closed(&self) -> usize {
        self.script.lock().unwrap().closed
    }

    pub(crate) fn system_prompts(&self) -> Vec<String> {
        self.script.lock().unwrap().system_prompts.clone()
    }

    /// Every `(prompt, max_tokens)` pair that reached the backend.
    pub(crate) fn generations(&self) -> Vec<(String, u32)> {
        self.script.lock().unwrap().generations.clone()
    }
}

impl Backend for ScriptedBackend {
    type Session = ScriptedSession;

    fn open_session(&self, system_prompt: &str) -> Result<ScriptedSession> {
        let mut script = self.script.lock().unwrap();
        assert_eq!(
            script.opened, script.closed,
            "a session was opened while another is still active"
        );
        script.opened += 1;
        script.system_prompts.push(system_prompt.to_string());
        Ok(ScriptedSession {
            script: Arc::clone(&self.script),
        })
    }
}

pub(crate) struct ScriptedSession {
    script: Arc<Mutex<Script>>,
}

impl Conversation for ScriptedSession {
    fn generate(&mut self, prompt: &str, max_tokens: u32) -> TokenStream<'_> {
        let mut script = self.script.lock().unwrap();
        script.generations.push((prompt.to_string(), max_tokens));
        let reply = script.replies.pop_front().unwrap_or_default();
        Box::pin(stream::iter(reply))
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.script.lock().unwrap().closed += 1;
    }
}
