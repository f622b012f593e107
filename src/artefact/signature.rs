//! Best-effort detached-signature verification of the checksum manifest.
//!
//! The trust model is: the pinned checksum is necessary and sufficient to
//! proceed; the release signature is advisory. Key import and verification
//! both shell out to `gpg`, and every failure path (no gpg on PATH,
//! keyserver unreachable, bad signature, timeout) degrades to
//! [`SignatureOutcome::Unverified`] rather than aborting the pipeline.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Keyserver queried for the release-signing keys.
const KEYSERVER: &str = "hkps://keys.openpgp.org";

/// Fingerprints of the release-signing keys accepted for Meridian builds.
const SIGNING_KEY_FINGERPRINTS: [&str; 2] = [
    "3A1D9B74C06F2E58A47D91B0E6C3F8527D04A19C",
    "9F40E2D1785B3CA6014E8F7D2B96C05A83E1D642",
];

/// Timeout for each gpg invocation (key import may hit the network).
const GPG_TIMEOUT: Duration = Duration::from_secs(60);

/// The outcome of the signature verification attempt.
///
/// This is deliberately not a `Result`: signature failures are never fatal.
/// Callers pattern-match and record the degraded-trust outcome on
/// [`Unverified`](SignatureOutcome::Unverified).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// The manifest signature was verified against a known release key.
    Verified,
    /// Verification did not complete; the release is trusted on checksum
    /// alone.
    Unverified {
        /// A human-readable explanation of the degradation.
        reason: String,
    },
}

impl SignatureOutcome {
    /// Whether the manifest authenticity was established.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Import the release-signing keys, then verify `signature` over
/// `manifest`.
///
/// Never fails the pipeline: any error at any step yields
/// [`SignatureOutcome::Unverified`] with the reason folded in.
#[must_use]
pub fn verify_manifest_signature(manifest: &Path, signature: &Path) -> SignatureOutcome {
    if let Err(reason) = import_signing_keys() {
        return SignatureOutcome::Unverified { reason };
    }
    match run_gpg(&[
        "--verify",
        &signature.display().to_string(),
        &manifest.display().to_string(),
    ]) {
        Ok(output) if output.status.success() => SignatureOutcome::Verified,
        Ok(output) => SignatureOutcome::Unverified {
            reason: format!(
                "signature did not verify: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        },
        Err(reason) => SignatureOutcome::Unverified { reason },
    }
}

/// Fetch the known release-signing keys from the keyserver.
fn import_signing_keys() -> Result<(), String> {
    let mut args = vec!["--keyserver", KEYSERVER, "--recv-keys"];
    args.extend(SIGNING_KEY_FINGERPRINTS);
    let output = run_gpg(&args)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(format!(
            "key import failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

/// Run gpg with a timeout, capturing output.
///
/// Returns a descriptive error string if gpg cannot be started or exceeds
/// the timeout; exit-status interpretation is left to the caller.
fn run_gpg(args: &[&str]) -> Result<Output, String> {
    let mut child = Command::new("gpg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to run gpg: {e}"))?;

    match child
        .wait_timeout(GPG_TIMEOUT)
        .map_err(|e| format!("failed waiting for gpg: {e}"))?
    {
        Some(status) => {
            let stdout = child
                .stdout
                .take()
                .map(std::io::read_to_string)
                .transpose()
                .map_err(|e| format!("failed reading gpg stdout: {e}"))?
                .unwrap_or_default();
            let stderr = child
                .stderr
                .take()
                .map(std::io::read_to_string)
                .transpose()
                .map_err(|e| format!("failed reading gpg stderr: {e}"))?
                .unwrap_or_default();
            Ok(Output {
                status,
                stdout: stdout.into_bytes(),
                stderr: stderr.into_bytes(),
            })
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(format!(
                "gpg timed out after {} seconds",
                GPG_TIMEOUT.as_secs()
            ))
        }
    }
}
