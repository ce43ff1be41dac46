//! Process-wide interrupt handling.
//!
//! An interrupt (SIGINT, or SIGTERM) ends the process at once with a success
//! status.  No state is inspected and nothing is cleaned up: a response being
//! streamed is abandoned and a capture file being written may be left partial.

use crate::error::{Error, Result};

/// The status the process exits with when interrupted.
pub const CANCELLED_EXIT_CODE: i32 = 0;

/// Installs the interrupt handler.  Call once, before anything else runs.
///
/// # Errors
///
/// Fails if a handler is already installed or the signal cannot be hooked.
pub fn install() -> Result<()> {
    let installed = ctrlc::set_handler(|| {
        terminate();
    });
    installed.map_err(|e| {
        Error::io(
            "failed to install interrupt handler",
            std::io::Error::other(e.to_string()),
        )
    })
}

/// Exits the process as if an interrupt had arrived.
pub fn terminate() -> ! {
    tracing::debug!("interrupted");
    std::process::exit(CANCELLED_EXIT_CODE)
}
