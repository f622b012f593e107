//! Pinned release identity and distribution URL derivation.
//!
//! A provisioner binary targets exactly one Meridian release: the version
//! and its archive digest are compiled in, so a compromised or stale
//! distribution mirror can never substitute different bytes. Only the base
//! URL may vary at runtime (to use a mirror).

use crate::artefact::digest::Sha256Digest;

/// The release version this provisioner installs.
pub const RELEASE_VERSION: &str = "0.3.1";

/// The default distribution root.
pub const DEFAULT_BASE_URL: &str = "https://releases.meridian.example";

/// SHA-256 digest of the release archive for [`RELEASE_VERSION`].
///
/// This is the single authority for artefact integrity; the downloaded
/// checksum manifest corroborates it but can never override it.
pub const RELEASE_DIGEST: &str = "7c9f51e2b0a4d6c8e1f3a5b7d9c0e2f4a6b8d0c1e3f5a7b9d1c2e4f6a8b0d2c4";

/// Target platform token embedded in the artefact filename.
pub const RELEASE_PLATFORM: &str = "x86_64-linux-gnu";

/// Executables that every Meridian release archive must contain, in the
/// order they are reported to the operator.
pub const REQUIRED_BINARIES: [&str; 4] =
    ["meridiand", "meridian-cli", "meridian-tx", "meridian-wallet"];

/// Name of the daemon executable, the launch target.
pub const DAEMON_BINARY: &str = REQUIRED_BINARIES[0];

/// Filename of the checksum manifest published alongside each release.
pub const CHECKSUMS_FILE: &str = "SHA256SUMS";

/// Filename of the detached signature over the checksum manifest.
pub const SIGNATURE_FILE: &str = "SHA256SUMS.asc";

/// Identity of one fetchable release: version, distribution root, and the
/// pinned archive digest.
///
/// Immutable for the lifetime of a pipeline run.
///
/// # Examples
///
/// ```
/// use meridian_provisioner::release::ReleaseDescriptor;
///
/// let release = ReleaseDescriptor::pinned().expect("pinned digest is valid");
/// assert!(release.artefact_url().contains(release.version()));
/// ```
#[derive(Debug, Clone)]
pub struct ReleaseDescriptor {
    version: String,
    base_url: String,
    expected_digest: Sha256Digest,
}

impl ReleaseDescriptor {
    /// Build the descriptor for the compiled-in release and default
    /// distribution root.
    ///
    /// # Errors
    ///
    /// Returns an error if the compiled-in digest constant is malformed.
    pub fn pinned() -> crate::artefact::digest::DigestResult<Self> {
        Self::new(RELEASE_VERSION, DEFAULT_BASE_URL, RELEASE_DIGEST)
    }

    /// Build a descriptor with an explicit version, base URL, and digest.
    ///
    /// # Errors
    ///
    /// Returns an error if `expected_digest` is not a well-formed SHA-256
    /// hex string.
    pub fn new(
        version: &str,
        base_url: &str,
        expected_digest: &str,
    ) -> crate::artefact::digest::DigestResult<Self> {
        Ok(Self {
            version: version.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            expected_digest: Sha256Digest::try_from(expected_digest)?,
        })
    }

    /// Return a copy of this descriptor pointing at a different
    /// distribution root.
    #[must_use]
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self {
            version: self.version.clone(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            expected_digest: self.expected_digest.clone(),
        }
    }

    /// The release version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The pinned digest of the release archive.
    #[must_use]
    pub fn expected_digest(&self) -> &Sha256Digest {
        &self.expected_digest
    }

    /// Filename of the release archive.
    #[must_use]
    pub fn artefact_filename(&self) -> String {
        format!("meridian-{}-{RELEASE_PLATFORM}.tar.gz", self.version)
    }

    /// Release directory URL under the distribution root.
    fn release_dir(&self) -> String {
        format!("{}/v{}", self.base_url, self.version)
    }

    /// Full URL of the release archive.
    #[must_use]
    pub fn artefact_url(&self) -> String {
        format!("{}/{}", self.release_dir(), self.artefact_filename())
    }

    /// Full URL of the checksum manifest.
    #[must_use]
    pub fn checksums_url(&self) -> String {
        format!("{}/{CHECKSUMS_FILE}", self.release_dir())
    }

    /// Full URL of the detached signature over the checksum manifest.
    #[must_use]
    pub fn signature_url(&self) -> String {
        format!("{}/{SIGNATURE_FILE}", self.release_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_descriptor_is_well_formed() {
        let release = ReleaseDescriptor::pinned().expect("pinned digest parses");
        assert_eq!(release.version(), RELEASE_VERSION);
        assert_eq!(release.expected_digest().as_str(), RELEASE_DIGEST);
    }

    #[test]
    fn artefact_url_contains_version_directory_and_filename() {
        let release = ReleaseDescriptor::pinned().expect("pinned digest parses");
        let url = release.artefact_url();
        assert!(url.starts_with(DEFAULT_BASE_URL));
        assert!(url.contains(&format!("/v{RELEASE_VERSION}/")));
        assert!(url.ends_with(".tar.gz"));
    }

    #[test]
    fn manifest_and_signature_urls_share_the_release_directory() {
        let release = ReleaseDescriptor::pinned().expect("pinned digest parses");
        assert!(release.checksums_url().ends_with("SHA256SUMS"));
        assert!(release.signature_url().ends_with("SHA256SUMS.asc"));
    }

    #[test]
    fn base_url_trailing_slash_is_normalised() {
        let release = ReleaseDescriptor::new("0.3.1", "https://mirror.test/", &"a".repeat(64))
            .expect("valid digest");
        assert!(!release.artefact_url().contains("//v"));
    }

    #[test]
    fn with_base_url_keeps_version_and_digest() {
        let release = ReleaseDescriptor::pinned().expect("pinned digest parses");
        let mirrored = release.with_base_url("https://mirror.test");
        assert_eq!(mirrored.version(), release.version());
        assert_eq!(mirrored.expected_digest(), release.expected_digest());
        assert!(mirrored.artefact_url().starts_with("https://mirror.test"));
    }

    #[test]
    fn daemon_is_first_required_binary() {
        assert_eq!(DAEMON_BINARY, "meridiand");
        assert_eq!(REQUIRED_BINARIES.len(), 4);
    }
}
