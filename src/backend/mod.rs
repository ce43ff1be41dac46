//! The contract shellm expects from a model backend.
//!
//! A backend is loaded once, opens conversational sessions, and turns a prompt
//! into a lazy [`TokenStream`].  Sessions own their history; callers only ever
//! see "this session remembers prior turns".  Dropping a session releases it.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;

#[cfg(test)]
pub(crate) mod scripted;

/// A finite, ordered, single-consumption sequence of fragments for one generation.
///
/// The stream borrows its session mutably, so a session never has two
/// generations in flight.
pub type TokenStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// Device preference recorded when a model is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Device {
    /// Run on the CPU.
    Cpu,
    /// Run on the GPU.
    #[default]
    Gpu,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Gpu => write!(f, "gpu"),
        }
    }
}

/// Options that control how a backend resolves its artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Whether the backend may obtain an artifact that is not present locally.
    pub allow_network_fetch: bool,
    /// Preferred device.
    pub device: Device,
}

/// A loaded model that can open conversational sessions.
pub trait Backend {
    /// The session type this backend hands out.
    type Session: Conversation;

    /// Opens a new session that uses `system_prompt` as its system instruction.
    fn open_session(&self, system_prompt: &str) -> Result<Self::Session>;
}

/// A backend-owned conversation.
///
/// Implementations release their resources in `Drop`.
pub trait Conversation: Send {
    /// Starts a streamed generation for `prompt`, bounded by `max_tokens`.
    ///
    /// Nothing is sent to the model until the stream is first polled.  The
    /// turn becomes part of the session history only once the stream has been
    /// drained without error.
    fn generate(&mut self, prompt: &str, max_tokens: u32) -> TokenStream<'_>;

    /// Closes the session.
    fn close(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}
