//! Progress and diagnostic output for the provisioner CLI.
//!
//! All user-visible lines go to an injected stderr sink so tests can capture
//! them. Stage lines carry a UTC timestamp; the final line before exit states
//! the terminal outcome unambiguously.

use std::io::Write;

/// Write a single line to the given sink, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Write a timestamped line to the given sink.
///
/// Used for pipeline stage transitions and warnings, where the operator
/// needs to correlate output with external events (network stalls, keyserver
/// outages).
pub fn write_stamped_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    let stamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    write_stderr_line(stderr, format!("[{stamp}] {message}"));
}

/// Write a timestamped warning line.
pub fn write_warning(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    write_stamped_line(stderr, format!("warning: {message}"));
}

/// Format the success message printed when provisioning completes without
/// launching.
#[must_use]
pub fn provisioned_message(version: &str, bin_dir: &camino::Utf8Path) -> String {
    format!("Meridian {version} provisioned and verified at {bin_dir}")
}
