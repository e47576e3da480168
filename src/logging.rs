//! Diagnostic logging setup.
//!
//! User-facing output goes through [`crate::chat::Renderer`]; this module only
//! routes `tracing` diagnostics, which default to errors on stderr.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "REVOLT_LOG";

const DEFAULT_FILTER: &str = "error";

/// Builds the filter from [`LOG_ENV`], falling back to errors only.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber.  With `log_file` set, diagnostics are
/// appended there instead of stderr so they do not interleave with the prompt.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false);
    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| Error::io(format!("failed to open {}", path.display()), err))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|err| Error::unknown(format!("failed to install logger: {err}")))
}
