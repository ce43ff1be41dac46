//! Configuration types for shellm.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved,
//! immutable [`Config`] that is handed to the runners.  Everything here is
//! validated before a model is loaded or a session is opened.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use url::Url;

use crate::error::{Error, Result};
use crate::llama::DEFAULT_SERVER_URL;
use crate::render::DEFAULT_REFRESH_DELAY;
use crate::sink::CaptureSink;

/// Default maximum tokens per response.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default directory that preset names resolve under.
pub const DEFAULT_MODELS_DIR: &str = "models";

/// A named model in the fixed preset registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    /// The name accepted by `--model`.
    pub name: &'static str,
    /// The artifact file name inside the models directory.
    pub file: &'static str,
}

/// The known model presets.
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "small",
        file: "Nous-Hermes-2-Mistral-7B-DPO.Q4_0.gguf",
    },
    Preset {
        name: "large",
        file: "phi-4-fp16.gguf",
    },
];

/// Looks up a preset by name.
pub fn find_preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|preset| preset.name == name)
}

/// Command-line arguments for the shellm tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ShellArgs {
    /// Model artifact path or preset name.
    #[arrrg(optional, "Model path (.gguf) or preset: small, large", "MODEL")]
    pub model: Option<String>,

    /// Select the large preset when no model is given.
    #[arrrg(flag, "Use the large preset when --model is not given")]
    pub large: bool,

    /// Directory that preset names resolve under.
    #[arrrg(optional, "Directory holding preset models (default: models)", "DIR")]
    pub models_dir: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 1024)", "TOKENS")]
    pub max_tokens: Option<String>,

    /// Capture file for completed responses.
    #[arrrg(optional, "Append each complete response to this file", "PATH")]
    pub out: Option<String>,

    /// Request chat mode.
    #[arrrg(flag, "Request chat mode (the mode follows whether stdin is a terminal)")]
    pub chat: bool,

    /// Base URL of the llama-server instance.
    #[arrrg(optional, "llama-server base URL (default: http://127.0.0.1:8080/)", "URL")]
    pub server: Option<String>,

    /// Pause between repaints, in milliseconds.
    #[arrrg(optional, "Milliseconds between repaints (default: 20)", "MS")]
    pub delay_ms: Option<String>,

    /// Disable markdown styling.
    #[arrrg(flag, "Print raw text instead of styled markdown")]
    pub no_color: bool,

    /// List the preset registry and exit.
    #[arrrg(flag, "List preset models and exit")]
    pub list_models: bool,

    /// Enable debug logging.
    #[arrrg(flag, "Log debug output to stderr")]
    pub verbose: bool,
}

/// Where the model artifact comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLocator {
    /// A named entry of [`PRESETS`].
    Preset(&'static Preset),
    /// An explicit artifact path.
    Path(PathBuf),
}

impl ModelLocator {
    /// Parses a `--model` value: a preset name, otherwise a path.
    pub fn parse(value: &str) -> Result<Self> {
        if value.trim().is_empty() {
            return Err(Error::configuration(
                "model locator is empty",
                Some("model".to_string()),
            ));
        }
        Ok(match find_preset(value) {
            Some(preset) => ModelLocator::Preset(preset),
            None => ModelLocator::Path(PathBuf::from(value)),
        })
    }

    /// Resolves the locator to an artifact path.
    pub fn resolve(&self, models_dir: &Path) -> PathBuf {
        match self {
            ModelLocator::Preset(preset) => models_dir.join(preset.file),
            ModelLocator::Path(path) => path.clone(),
        }
    }
}

impl std::fmt::Display for ModelLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelLocator::Preset(preset) => write!(f, "{} ({})", preset.name, preset.file),
            ModelLocator::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The settings every generation runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Pause between repaints.
    pub refresh_delay: Duration,
    /// Where completed responses are appended, if anywhere.
    pub sink: Option<CaptureSink>,
}

/// Resolved configuration for one shellm invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The model to load.
    pub model: ModelLocator,

    /// Directory that presets resolve under.
    pub models_dir: PathBuf,

    /// Maximum tokens per response.  Always positive.
    pub max_tokens: u32,

    /// Capture file for completed responses.
    pub out: Option<PathBuf>,

    /// Trailing free-text arguments joined by single spaces.
    pub residual_prompt: String,

    /// Whether `--chat` was given.  Does not select the mode.
    pub chat_requested: bool,

    /// Base URL of the llama-server instance, always ending in `/`.
    pub server_url: Url,

    /// Pause between repaints.
    pub refresh_delay: Duration,

    /// Whether to style output as markdown.
    pub use_color: bool,

    /// Whether debug logging was requested.
    pub verbose: bool,
}

impl Config {
    /// Creates a Config for `model` with default values.
    ///
    /// Defaults:
    /// - Models directory: `models`
    /// - Max tokens: 1024
    /// - Server: `http://127.0.0.1:8080/`
    /// - Refresh delay: 20ms
    /// - Color: enabled
    pub fn new(model: ModelLocator) -> Self {
        Self {
            model,
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            max_tokens: DEFAULT_MAX_TOKENS,
            out: None,
            residual_prompt: String::new(),
            chat_requested: false,
            server_url: default_server_url(),
            refresh_delay: DEFAULT_REFRESH_DELAY,
            use_color: true,
            verbose: false,
        }
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the capture file.
    pub fn with_out(mut self, out: Option<PathBuf>) -> Self {
        self.out = out;
        self
    }

    /// Sets the repaint delay.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Builds a Config from parsed flags and the free arguments after them.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no model is given, the token budget
    /// is not a positive integer, the delay is not a whole number, or the
    /// server URL does not parse.
    pub fn from_args(args: ShellArgs, free: Vec<String>) -> Result<Self> {
        let model = match (args.model, args.large) {
            (Some(model), _) => ModelLocator::parse(&model)?,
            (None, true) => ModelLocator::parse("large")?,
            (None, false) => {
                return Err(Error::configuration(
                    "a model is required (--model <path|small|large>)",
                    Some("model".to_string()),
                ));
            }
        };

        let max_tokens = match args.max_tokens.as_deref() {
            Some(tokens) => parse_max_tokens(tokens)?,
            None => DEFAULT_MAX_TOKENS,
        };
        let refresh_delay = match args.delay_ms.as_deref() {
            Some(ms) => parse_delay(ms)?,
            None => DEFAULT_REFRESH_DELAY,
        };

        let server_url = match args.server {
            Some(server) => parse_server_url(&server)?,
            None => default_server_url(),
        };

        Ok(Config {
            model,
            models_dir: args
                .models_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR)),
            max_tokens,
            out: args.out.map(PathBuf::from),
            residual_prompt: free.join(" "),
            chat_requested: args.chat,
            server_url,
            refresh_delay,
            use_color: !args.no_color,
            verbose: args.verbose,
        })
    }

    /// The artifact path the model locator resolves to.
    pub fn artifact(&self) -> PathBuf {
        self.model.resolve(&self.models_dir)
    }

    /// Resolves the artifact and checks that it exists.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the resolved path does not exist.
    pub fn existing_artifact(&self) -> Result<PathBuf> {
        let artifact = self.artifact();
        if artifact.is_file() {
            Ok(artifact)
        } else {
            Err(Error::configuration(
                format!(
                    "model {} resolves to {}, which does not exist",
                    self.model,
                    artifact.display()
                ),
                Some("model".to_string()),
            ))
        }
    }

    /// The settings both runners generate with.
    pub fn generation(&self) -> GenerationSettings {
        GenerationSettings {
            max_tokens: self.max_tokens,
            refresh_delay: self.refresh_delay,
            sink: self.out.as_ref().map(CaptureSink::new),
        }
    }
}

impl Default for Config {
    /// The `small` preset with default settings.
    fn default() -> Self {
        Self::new(ModelLocator::Preset(&PRESETS[0]))
    }
}

fn parse_max_tokens(value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(tokens) if tokens > 0 => Ok(tokens),
        _ => Err(Error::configuration(
            "max tokens must be a positive integer",
            Some("max-tokens".to_string()),
        )),
    }
}

fn parse_delay(value: &str) -> Result<Duration> {
    value.trim().parse::<u64>().map(Duration::from_millis).map_err(|_| {
        Error::configuration(
            "delay must be a whole number of milliseconds",
            Some("delay-ms".to_string()),
        )
    })
}

fn default_server_url() -> Url {
    Url::parse(DEFAULT_SERVER_URL).expect("default server URL should parse")
}

fn parse_server_url(value: &str) -> Result<Url> {
    let mut value = value.to_string();
    if !value.ends_with('/') {
        value.push('/');
    }
    let url = Url::parse(&value).map_err(|e| {
        Error::configuration(format!("invalid server URL {value}: {e}"), Some("server".to_string()))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::configuration(
            format!("unsupported server URL scheme {scheme}"),
            Some("server".to_string()),
        )),
    }
}
