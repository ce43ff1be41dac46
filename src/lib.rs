//! shellm: a terminal front-end for locally served language models.
//!
//! Piped stdin gets one answer and the process exits.  A terminal gets a chat
//! loop.  Either way the response is redrawn as markdown while it streams.

pub mod backend;
pub mod cancel;
pub mod chat;
pub mod config;
pub mod error;
pub mod llama;
pub mod mode;
pub mod oneshot;
pub mod prompt;
pub mod render;
pub mod sink;

mod observability;
mod sse;

pub use backend::{Backend, Conversation, Device, LoadOptions, TokenStream};
pub use config::{Config, GenerationSettings, ModelLocator, ShellArgs};
pub use error::{Error, Result};
pub use llama::LlamaServer;
pub use mode::Mode;
pub use observability::register_biometrics;
pub use prompt::{PromptContext, SYSTEM_PROMPT};
pub use render::{MarkdownRenderer, Renderer, render_stream};
pub use sink::CaptureSink;
