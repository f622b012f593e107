//! SHA-256 digest newtype and streaming file digest computation.
//!
//! Digest strings are validated and normalised to lowercase on construction,
//! so equality anywhere else in the pipeline is a plain string comparison and
//! case differences between sources can never cause a spurious mismatch.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Errors arising from digest validation or computation.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// The value is not a well-formed hex-encoded SHA-256 digest.
    #[error("invalid SHA-256 digest: {reason}")]
    Invalid {
        /// Why validation rejected the value.
        reason: String,
    },

    /// Reading the file to digest failed.
    #[error("failed to read file for digesting: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`DigestError`].
pub type DigestResult<T> = std::result::Result<T, DigestError>;

/// A validated, lowercase hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use meridian_provisioner::artefact::digest::Sha256Digest;
///
/// let digest = Sha256Digest::try_from("A".repeat(64).as_str()).unwrap();
/// assert_eq!(digest.as_str(), "a".repeat(64));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the digest as a lowercase hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = DigestError;

    fn try_from(value: &str) -> DigestResult<Self> {
        validate_hex(value)?;
        Ok(Self(value.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = DigestError;

    fn try_from(value: String) -> DigestResult<Self> {
        Self::try_from(value.as_str())
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate that `value` is 64 hex characters.
fn validate_hex(value: &str) -> DigestResult<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(DigestError::Invalid {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(DigestError::Invalid {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    Ok(())
}

/// Compute the SHA-256 digest of the file at `path`.
///
/// Reads in fixed-size chunks so archives never need to fit in memory.
///
/// # Errors
///
/// Returns [`DigestError::Io`] if the file cannot be read.
pub fn compute_sha256(path: &Path) -> DigestResult<Sha256Digest> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    let hex = format!("{:x}", hasher.finalize());
    // sha2 always produces valid 64-char lowercase hex.
    Ok(Sha256Digest(hex))
}
