//! Error types for shellm.
//!
//! Configuration and model-load failures are fatal and happen before any
//! session is opened.  Generation failures surface from a token stream and are
//! handled differently by the interactive loop and the one-shot runner.

use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::Utf8Error;
use std::sync::Arc;

/// The main error type for shellm.
#[derive(Clone, Debug)]
pub enum Error {
    /// Invalid or missing configuration.
    Configuration {
        /// Human-readable error message.
        message: String,
        /// Flag or parameter that caused the error.
        param: Option<String>,
    },

    /// The backend could not load the resolved model artifact.
    ModelLoad {
        /// Human-readable error message.
        message: String,
        /// The artifact that failed to load.
        path: Option<PathBuf>,
    },

    /// The backend failed while producing a token stream.
    Generation {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// Encoding/decoding error.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            param,
        }
    }

    /// Creates a new model load error.
    pub fn model_load(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Error::ModelLoad {
            message: message.into(),
            path,
        }
    }

    /// Creates a new generation error.
    pub fn generation(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Generation {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Returns true if this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Returns true if this error is a model load error.
    pub fn is_model_load(&self) -> bool {
        matches!(self, Error::ModelLoad { .. })
    }

    /// Returns true if this error is a generation error.
    pub fn is_generation(&self) -> bool {
        matches!(self, Error::Generation { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration { message, param } => {
                if let Some(param) = param {
                    write!(f, "Configuration error: {message} (parameter: {param})")
                } else {
                    write!(f, "Configuration error: {message}")
                }
            }
            Error::ModelLoad { message, path } => {
                if let Some(path) = path {
                    write!(f, "Model load error: {message} ({})", path.display())
                } else {
                    write!(f, "Model load error: {message}")
                }
            }
            Error::Generation { message, .. } => {
                write!(f, "Generation error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Encoding { message, .. } => {
                write!(f, "Encoding error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Generation { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

impl From<rustyline::error::ReadlineError> for Error {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        match err {
            rustyline::error::ReadlineError::Io(err) => Error::io("line editor I/O failed", err),
            err => Error::io(
                format!("line editor failed: {err}"),
                io::Error::other(err.to_string()),
            ),
        }
    }
}

/// A specialized Result type for shellm operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_follow_variant() {
        let config = Error::configuration("missing --model", Some("model".into()));
        assert!(config.is_configuration() && !config.is_model_load());
        let load = Error::model_load("not a gguf file", None);
        assert!(load.is_model_load() && !load.is_generation());
        assert!(Error::generation("stream broke", None).is_generation());
    }

    #[test]
    fn display_includes_param_and_path() {
        let err = Error::configuration("must be positive", Some("max-tokens".to_string()));
        assert_eq!(
            err.to_string(),
            "Configuration error: must be positive (parameter: max-tokens)"
        );
        let err = Error::model_load("missing", Some(PathBuf::from("models/x.gguf")));
        assert_eq!(err.to_string(), "Model load error: missing (models/x.gguf)");
    }

    #[test]
    fn io_error_has_source() {
        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(error::Error::source(&err).is_some());
    }
}
