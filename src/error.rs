//! Error types for the Meridian provisioner.
//!
//! This module defines semantic error variants for every fatal condition the
//! provisioning pipeline can hit. Degraded-but-survivable outcomes (an
//! unreachable keyserver, an advisory policy deviation) are not errors; they
//! are modelled as values in their own modules and never pass through here.

use crate::artefact::digest::DigestError;
use crate::artefact::download::DownloadError;
use crate::artefact::extraction::ExtractionError;
use crate::artefact::manifest::ManifestError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that abort the provisioning pipeline.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Downloading the release artefact or checksum manifest failed after
    /// the retry budget was exhausted.
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    /// The computed digest of the downloaded artefact does not match the
    /// pinned release digest.
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The artefact filename that failed verification.
        file: String,
        /// The pinned digest baked into this binary.
        expected: String,
        /// The digest computed from the downloaded bytes.
        actual: String,
    },

    /// The checksum manifest either lacks an entry for the artefact or
    /// records a digest that diverges from the pinned one.
    #[error("checksum manifest does not corroborate {file}: {reason}")]
    ManifestMismatch {
        /// The artefact filename looked up in the manifest.
        file: String,
        /// Why the manifest failed to corroborate the pinned digest.
        reason: String,
    },

    /// The checksum manifest could not be parsed.
    #[error("checksum manifest invalid: {0}")]
    Manifest(#[from] ManifestError),

    /// Computing or validating a digest failed.
    #[error("digest error: {0}")]
    Digest(#[from] DigestError),

    /// Unpacking the release archive failed.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// A binary required by the release layout is missing after extraction.
    #[error("release archive is incomplete: missing executable {name}")]
    MissingBinary {
        /// Name of the absent executable.
        name: String,
    },

    /// The installation directory could not be created or written.
    #[error("installation directory {path} is not usable: {reason}")]
    InstallDir {
        /// The directory that could not be prepared.
        path: Utf8PathBuf,
        /// Description of the underlying failure.
        reason: String,
    },

    /// The data directory could not be created with owner-only permissions.
    #[error("failed to prepare data directory {path}: {source}")]
    DataDir {
        /// The directory that could not be prepared.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the runtime configuration or credential file failed.
    #[error("failed to write {path}: {source}")]
    ConfigWrite {
        /// The file that could not be written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The operating system provided no usable strong random source.
    ///
    /// Secret generation refuses to degrade to a predictable source; the
    /// pipeline aborts instead.
    #[error("no strong random source available: {reason}")]
    EntropyUnavailable {
        /// Description of the RNG failure.
        reason: String,
    },

    /// The provisioned configuration is missing the mandatory content-policy
    /// flag, or carries it with a non-disabled value.
    #[error("security policy violation: {detail}")]
    PolicyViolation {
        /// Which policy condition failed and how.
        detail: String,
    },

    /// The daemon binary is absent or not executable at launch time.
    #[error("daemon binary {path} is not launchable: {reason}")]
    NotLaunchable {
        /// Path to the binary that failed the check.
        path: Utf8PathBuf,
        /// Description of the failed check.
        reason: String,
    },

    /// The pre-launch diagnostic invocation of the daemon failed.
    #[error("daemon preflight failed: {reason}")]
    Preflight {
        /// Description of the diagnostic failure.
        reason: String,
    },

    /// Spawning or replacing the process with the daemon failed.
    #[error("failed to launch daemon: {source}")]
    Launch {
        /// Underlying I/O error from process creation.
        #[source]
        source: std::io::Error,
    },

    /// Persisting the provisioning state marker failed.
    #[error("failed to persist provisioning state at {path}: {reason}")]
    StateStore {
        /// The marker file path.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`ProvisionError`].
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_mismatch_names_both_digests() {
        let err = ProvisionError::ChecksumMismatch {
            file: "meridian-0.3.1-x86_64-linux-gnu.tar.gz".to_owned(),
            expected: "a".repeat(64),
            actual: "b".repeat(64),
        };
        let msg = err.to_string();
        assert!(msg.contains(&"a".repeat(64)));
        assert!(msg.contains(&"b".repeat(64)));
        assert!(msg.contains("meridian-0.3.1"));
    }

    #[test]
    fn missing_binary_names_the_executable() {
        let err = ProvisionError::MissingBinary {
            name: "meridian-wallet".to_owned(),
        };
        assert!(err.to_string().contains("meridian-wallet"));
    }

    #[test]
    fn policy_violation_carries_detail() {
        let err = ProvisionError::PolicyViolation {
            detail: "datacarrier flag absent".to_owned(),
        };
        assert!(err.to_string().contains("datacarrier"));
    }

    #[test]
    fn config_write_preserves_source() {
        let err = ProvisionError::ConfigWrite {
            path: Utf8PathBuf::from("/data/meridian.conf"),
            source: std::io::Error::other("permission denied"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("meridian.conf"));
    }
}
