//! Crash artifacts for fatal runtime errors.

use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{Error, Result};

/// Prefix of crash artifact file names.
pub const CRASH_FILE_PREFIX: &str = "revolt-cli-crash-";

/// Renders the body of a crash artifact.
pub fn crash_report(at: OffsetDateTime, origin: &str, detail: &str) -> String {
    let timestamp = at
        .format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("--- FATAL ERROR ---\nTimestamp: {timestamp}\nOrigin: {origin}\nError: {detail}\n")
}

/// Writes `revolt-cli-crash-<unix millis>.txt` into `dir` and returns its path.
pub fn write_crash_report(dir: &Path, origin: &str, detail: &str) -> Result<PathBuf> {
    let now = OffsetDateTime::now_utc();
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let path = dir.join(format!("{CRASH_FILE_PREFIX}{millis}.txt"));
    fs::write(&path, crash_report(now, origin, detail))
        .map_err(|err| Error::io(format!("failed to write {}", path.display()), err))?;
    Ok(path)
}

/// Chains a panic hook that also writes a crash artifact into the working
/// directory.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let origin = info
            .location()
            .map(|location| format!("panic at {}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "panic".to_string());
        let detail = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        if let Ok(path) = write_crash_report(Path::new("."), &origin, &detail) {
            eprintln!("Crash details written to {}", path.display());
        }
        previous(info);
    }));
}
