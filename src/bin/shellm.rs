//! Ask a locally served model a question from the shell.
//!
//! # Usage
//!
//! ```bash
//! # One-shot: answer piped input and exit
//! echo "Explain recursion" | shellm --model small
//!
//! # Piped input plus trailing words, saved to a file
//! cat notes.txt | shellm --large --out answer.md summarize this
//!
//! # Chat, with the trailing words as background context
//! shellm --model models/phi-4-fp16.gguf we are debugging a Rust build
//! ```

use std::io;
use std::process;

use arrrg::CommandLine;
use tracing_subscriber::EnvFilter;

use shellm::chat::{ChatExit, ChatLoop, RustylineInput};
use shellm::config::PRESETS;
use shellm::{
    Config, Device, LlamaServer, LoadOptions, MarkdownRenderer, Mode, PromptContext, ShellArgs,
    cancel, mode, oneshot,
};

const USAGE: &str = "shellm [OPTIONS] [PROMPT]...";

#[tokio::main]
async fn main() {
    if let Err(err) = cancel::install() {
        eprintln!("{err}");
        process::exit(1);
    }

    let (args, free) = ShellArgs::from_command_line_relaxed(USAGE);

    if args.list_models {
        for preset in PRESETS {
            println!("{} - {}", preset.name, preset.file);
        }
        return;
    }

    let config = match Config::from_args(args, free) {
        Ok(config) => config,
        Err(err) => fail(err),
    };

    let filter = if config.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let artifact = match config.existing_artifact() {
        Ok(artifact) => artifact,
        Err(err) => fail(err),
    };
    let options = LoadOptions {
        allow_network_fetch: false,
        device: Device::Gpu,
    };
    let backend = match LlamaServer::load(&artifact, &config.server_url, options).await {
        Ok(backend) => backend,
        Err(err) => fail(err),
    };
    tracing::info!(
        model = backend.model_id(),
        artifact = %backend.artifact().display(),
        "model ready"
    );

    let settings = config.generation();
    let mut renderer = MarkdownRenderer::with_color(config.use_color);

    match Mode::from_stdin() {
        Mode::OneShot => {
            if config.chat_requested {
                tracing::warn!("--chat ignored: stdin is not a terminal");
            }
            let piped = match mode::read_piped(io::stdin().lock()) {
                Ok(piped) => piped,
                Err(err) => fail(err),
            };
            let prompt = PromptContext::default();
            if let Err(err) = oneshot::run(
                &backend,
                &prompt,
                &piped,
                &config.residual_prompt,
                &settings,
                &mut renderer,
            )
            .await
            {
                fail(err);
            }
        }
        Mode::Interactive => {
            let prompt = PromptContext::default().with_context(config.residual_prompt.clone());
            let mut input = match RustylineInput::new() {
                Ok(input) => input,
                Err(err) => fail(err),
            };
            let mut chat = ChatLoop::new(&backend, prompt, settings);
            match chat.run(&mut input, &mut renderer).await {
                Ok(ChatExit::Quit) => {}
                Ok(ChatExit::Interrupted) => cancel::terminate(),
                Err(err) => fail(err),
            }
        }
    }
}

fn fail(err: shellm::Error) -> ! {
    eprintln!("{err}");
    process::exit(1)
}
