//! Verified-daemon launch.
//!
//! The launcher is the terminal pipeline stage: after a preflight check that
//! the installed daemon exists, is executable, and answers a diagnostic
//! probe, the daemon is started with exactly two arguments binding it to the
//! provisioned configuration and data directory. On Unix the provisioner
//! replaces itself with the daemon; elsewhere the child is supervised and
//! its exit status propagated.

use crate::error::{ProvisionError, Result};
use camino::Utf8Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Substring in daemon output that marks a failed diagnostic probe.
const ERROR_MARKER: &str = "Error:";

/// Timeout for the preflight probe invocation.
const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a supervised launch concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStatus {
    /// The supervised child exited with the given code.
    Exited {
        /// The child's exit code (-1 when terminated by a signal).
        code: i32,
    },
}

/// Trait for starting the verified daemon, enabling test stubbing.
#[cfg_attr(test, mockall::automock)]
pub trait Launcher {
    /// Start `daemon` bound to `config` and `data_dir`.
    ///
    /// On Unix a successful start replaces the current process and this
    /// call never returns; on other platforms it blocks until the child
    /// exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started or replaced.
    fn launch(
        &self,
        daemon: &Utf8Path,
        config: &Utf8Path,
        data_dir: &Utf8Path,
    ) -> Result<LaunchStatus>;
}

/// Production launcher using process replacement where available.
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    #[cfg(unix)]
    fn launch(
        &self,
        daemon: &Utf8Path,
        config: &Utf8Path,
        data_dir: &Utf8Path,
    ) -> Result<LaunchStatus> {
        use std::os::unix::process::CommandExt;

        // exec only returns on failure.
        let source = launch_command(daemon, config, data_dir).exec();
        Err(ProvisionError::Launch { source })
    }

    #[cfg(not(unix))]
    fn launch(
        &self,
        daemon: &Utf8Path,
        config: &Utf8Path,
        data_dir: &Utf8Path,
    ) -> Result<LaunchStatus> {
        let status = launch_command(daemon, config, data_dir)
            .status()
            .map_err(|source| ProvisionError::Launch { source })?;
        Ok(LaunchStatus::Exited {
            code: status.code().unwrap_or(-1),
        })
    }
}

/// The daemon invocation: config file and data directory, nothing else.
fn launch_command(daemon: &Utf8Path, config: &Utf8Path, data_dir: &Utf8Path) -> Command {
    let mut command = Command::new(daemon.as_std_path());
    command.arg(format!("-conf={config}"));
    command.arg(format!("-datadir={data_dir}"));
    command
}

/// Check that `daemon` exists, is an executable file, and survives a
/// diagnostic probe invocation.
///
/// # Errors
///
/// Returns [`ProvisionError::NotLaunchable`] if the binary is missing or
/// not executable, or [`ProvisionError::Preflight`] if the probe cannot be
/// run or reports an error.
pub fn preflight(daemon: &Utf8Path) -> Result<()> {
    let metadata = std::fs::metadata(daemon.as_std_path()).map_err(|e| {
        ProvisionError::NotLaunchable {
            path: daemon.to_owned(),
            reason: format!("not found: {e}"),
        }
    })?;
    if !metadata.is_file() {
        return Err(ProvisionError::NotLaunchable {
            path: daemon.to_owned(),
            reason: "not a regular file".to_owned(),
        });
    }
    check_executable_bit(daemon, &metadata)?;
    probe(daemon)
}

#[cfg(unix)]
fn check_executable_bit(daemon: &Utf8Path, metadata: &std::fs::Metadata) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(ProvisionError::NotLaunchable {
            path: daemon.to_owned(),
            reason: "execute permission is not set".to_owned(),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_executable_bit(_daemon: &Utf8Path, _metadata: &std::fs::Metadata) -> Result<()> {
    Ok(())
}

/// Run the daemon's help invocation and scan its output for the error
/// marker.
fn probe(daemon: &Utf8Path) -> Result<()> {
    let mut child = Command::new(daemon.as_std_path())
        .arg("-?")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ProvisionError::Preflight {
            reason: format!("failed to run {daemon}: {e}"),
        })?;

    let status = child
        .wait_timeout(PREFLIGHT_TIMEOUT)
        .map_err(|e| ProvisionError::Preflight {
            reason: format!("failed waiting for probe: {e}"),
        })?;
    if status.is_none() {
        let _ = child.kill();
        let _ = child.wait();
        return Err(ProvisionError::Preflight {
            reason: format!(
                "probe timed out after {} seconds",
                PREFLIGHT_TIMEOUT.as_secs()
            ),
        });
    }

    let stdout = child
        .stdout
        .take()
        .map(std::io::read_to_string)
        .transpose()
        .map_err(|e| ProvisionError::Preflight {
            reason: format!("failed reading probe stdout: {e}"),
        })?
        .unwrap_or_default();
    let stderr = child
        .stderr
        .take()
        .map(std::io::read_to_string)
        .transpose()
        .map_err(|e| ProvisionError::Preflight {
            reason: format!("failed reading probe stderr: {e}"),
        })?
        .unwrap_or_default();

    for line in stdout.lines().chain(stderr.lines()) {
        if line.contains(ERROR_MARKER) {
            return Err(ProvisionError::Preflight {
                reason: format!("probe reported: {}", line.trim()),
            });
        }
    }
    Ok(())
}
