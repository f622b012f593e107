//! Checksum manifest parsing and per-file digest lookup.
//!
//! Release checksum manifests are the conventional `sha256sum` text format:
//! one line per file, a 64-char hex digest, whitespace (with an optional `*`
//! binary marker), then the filename. The manifest is a secondary
//! corroboration of the pinned release digest, never a substitute for it, so
//! parsing is strict: a malformed line that would be skipped silently could
//! mask tampering.

use crate::artefact::digest::Sha256Digest;
use std::collections::BTreeMap;

/// Errors arising from checksum manifest parsing.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// A line did not match the `<digest> <filename>` shape.
    #[error("malformed checksum line {line_number}: {content}")]
    MalformedLine {
        /// 1-based line number in the manifest.
        line_number: usize,
        /// The offending line content.
        content: String,
    },

    /// A digest field failed SHA-256 validation.
    #[error("invalid digest on line {line_number}: {reason}")]
    InvalidDigest {
        /// 1-based line number in the manifest.
        line_number: usize,
        /// Why the digest was rejected.
        reason: String,
    },

    /// The same filename appeared twice with different digests.
    #[error("conflicting entries for {file}")]
    ConflictingEntries {
        /// The filename listed more than once.
        file: String,
    },
}

/// A parsed checksum manifest mapping filenames to digests.
///
/// # Examples
///
/// ```
/// use meridian_provisioner::artefact::manifest::ChecksumManifest;
///
/// let text = format!("{}  meridian-0.3.1-x86_64-linux-gnu.tar.gz\n", "a".repeat(64));
/// let manifest = ChecksumManifest::parse(&text).unwrap();
/// assert!(manifest.digest_for("meridian-0.3.1-x86_64-linux-gnu.tar.gz").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: BTreeMap<String, Sha256Digest>,
}

impl ChecksumManifest {
    /// Parse `sha256sum`-format text into a manifest.
    ///
    /// Blank lines and `#` comment lines are ignored. A leading `*` on the
    /// filename (binary-mode marker) is stripped.
    ///
    /// # Errors
    ///
    /// Returns an error on any malformed line, invalid digest, or
    /// conflicting duplicate entry.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut entries = BTreeMap::new();
        for (index, raw_line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (digest_hex, name_field) =
                line.split_once(char::is_whitespace)
                    .ok_or_else(|| ManifestError::MalformedLine {
                        line_number,
                        content: line.to_owned(),
                    })?;
            let file = name_field
                .trim_start()
                .trim_start_matches('*')
                .to_owned();
            if file.is_empty() {
                return Err(ManifestError::MalformedLine {
                    line_number,
                    content: line.to_owned(),
                });
            }

            let digest = Sha256Digest::try_from(digest_hex).map_err(|e| {
                ManifestError::InvalidDigest {
                    line_number,
                    reason: e.to_string(),
                }
            })?;

            if let Some(existing) = entries.get(&file) {
                if *existing != digest {
                    return Err(ManifestError::ConflictingEntries { file });
                }
                continue;
            }
            entries.insert(file, digest);
        }
        Ok(Self { entries })
    }

    /// Look up the digest recorded for `file`.
    #[must_use]
    pub fn digest_for(&self, file: &str) -> Option<&Sha256Digest> {
        self.entries.get(file)
    }

    /// Number of files listed in the manifest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest lists no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ARCHIVE: &str = "meridian-0.3.1-x86_64-linux-gnu.tar.gz";

    fn manifest_line(digest: &str, file: &str) -> String {
        format!("{digest}  {file}\n")
    }

    #[test]
    fn parses_standard_two_space_lines() {
        let text = manifest_line(&"a".repeat(64), ARCHIVE);
        let manifest = ChecksumManifest::parse(&text).expect("valid manifest");
        assert_eq!(
            manifest.digest_for(ARCHIVE).map(Sha256Digest::as_str),
            Some("a".repeat(64).as_str())
        );
    }

    #[test]
    fn parses_binary_mode_star_marker() {
        let text = format!("{} *{ARCHIVE}\n", "b".repeat(64));
        let manifest = ChecksumManifest::parse(&text).expect("valid manifest");
        assert!(manifest.digest_for(ARCHIVE).is_some());
    }

    #[test]
    fn ignores_blank_and_comment_lines() {
        let text = format!("# release 0.3.1\n\n{}", manifest_line(&"c".repeat(64), ARCHIVE));
        let manifest = ChecksumManifest::parse(&text).expect("valid manifest");
        assert_eq!(manifest.len(), 1);
    }

    #[rstest]
    #[case::no_filename("aaaa")]
    #[case::short_digest("abc123  file.tar.gz")]
    fn rejects_malformed_lines(#[case] line: &str) {
        assert!(ChecksumManifest::parse(line).is_err());
    }

    #[test]
    fn rejects_conflicting_duplicate_entries() {
        let text = format!(
            "{}{}",
            manifest_line(&"a".repeat(64), ARCHIVE),
            manifest_line(&"b".repeat(64), ARCHIVE)
        );
        let result = ChecksumManifest::parse(&text);
        assert!(matches!(
            result,
            Err(ManifestError::ConflictingEntries { file }) if file == ARCHIVE
        ));
    }

    #[test]
    fn tolerates_identical_duplicate_entries() {
        let line = manifest_line(&"d".repeat(64), ARCHIVE);
        let text = format!("{line}{line}");
        let manifest = ChecksumManifest::parse(&text).expect("valid manifest");
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn lookup_misses_unlisted_files() {
        let text = manifest_line(&"e".repeat(64), ARCHIVE);
        let manifest = ChecksumManifest::parse(&text).expect("valid manifest");
        assert!(manifest.digest_for("meridian-9.9.9.tar.gz").is_none());
    }
}
