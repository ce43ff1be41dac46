//! Append-only capture of completed generations.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::observability::{SINK_BYTES, SINK_WRITES};

/// A file that receives the full text of each completed generation.
///
/// The file is opened in append mode for every write and closed again, so
/// prior content is never truncated and nothing is held open between turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSink {
    path: PathBuf,
}

impl CaptureSink {
    /// Creates a sink that appends to `path`.  The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this sink appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `text` to the sink.
    pub fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| {
                Error::io(
                    format!("failed to open capture file {}", self.path.display()),
                    err,
                )
            })?;
        file.write_all(text.as_bytes()).map_err(|err| {
            Error::io(
                format!("failed to write capture file {}", self.path.display()),
                err,
            )
        })?;
        SINK_WRITES.click();
        SINK_BYTES.count(text.len() as u64);
        Ok(())
    }
}
