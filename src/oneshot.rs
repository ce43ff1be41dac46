//! Pipe-through mode: one prompt in, one rendered response out.

use crate::backend::{Backend, Conversation};
use crate::config::GenerationSettings;
use crate::error::Result;
use crate::prompt::PromptContext;
use crate::render::{Renderer, render_stream};

/// Joins piped input and the residual prompt exactly as given.
///
/// No separator is inserted and nothing is trimmed.
pub fn combine_prompt(piped: &str, residual: &str) -> String {
    format!("{piped}{residual}")
}

/// Runs a single generation on an ephemeral session and returns its text.
///
/// # Errors
///
/// Returns an error if the session cannot be opened, the generation fails, or
/// the sink cannot be written.
pub async fn run<B, R>(
    backend: &B,
    prompt: &PromptContext,
    piped: &str,
    residual: &str,
    settings: &GenerationSettings,
    renderer: &mut R,
) -> Result<String>
where
    B: Backend,
    R: Renderer + ?Sized,
{
    let combined = combine_prompt(piped, residual);
    tracing::debug!(
        piped_bytes = piped.len(),
        residual_bytes = residual.len(),
        max_tokens = settings.max_tokens,
        "one-shot generation"
    );

    let mut session = backend.open_session(&prompt.system_prompt())?;
    let text = render_stream(
        renderer,
        session.generate(&combined, settings.max_tokens),
        settings.refresh_delay,
        settings.sink.as_ref(),
    )
    .await?;
    session.close();
    Ok(text)
}
