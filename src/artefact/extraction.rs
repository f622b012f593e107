//! Archive extraction for the release tarball.
//!
//! Extracts `.tar.gz` archives with path traversal protection, stripping the
//! archive's single top-level directory so the executables land directly in
//! the destination. Extraction always targets a fresh staging directory;
//! [`promote_staging`] swaps it into place so a prior installation is never
//! left half-replaced.

use camino::Utf8Path;
use std::path::{Component, Path, PathBuf};

/// Trait for extracting release archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`, stripping the
    /// leading path component of every entry.
    ///
    /// Returns the relative paths of the extracted files.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ExtractionError::EmptyArchive`]
    /// if no files are found, or [`ExtractionError::Io`] on I/O failures.
    fn extract(&self, archive_path: &Path, dest_dir: &Path)
    -> Result<Vec<String>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,
}

/// Default extractor using `tar` and `flate2`.
///
/// Validates each entry path before extraction to guard against path
/// traversal attacks (zip-slip).
pub struct GzExtractor;

impl ReleaseExtractor for GzExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<String>, ExtractionError> {
        let file = std::fs::File::open(archive_path)?;
        let decoder = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(decoder);
        let mut extracted = Vec::new();

        for entry_result in archive.entries()? {
            let mut entry = entry_result?;
            let entry_path = entry.path()?.into_owned();

            validate_entry_path(&entry_path)?;

            // Drop the archive's top-level directory. An entry that is
            // nothing but that directory has no remainder and is skipped.
            let stripped: PathBuf = entry_path.components().skip(1).collect();
            if stripped.as_os_str().is_empty() {
                continue;
            }

            let dest_path = dest_dir.join(&stripped);
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let is_file = entry.header().entry_type().is_file();
            entry.unpack(&dest_path)?;

            if is_file {
                extracted.push(stripped.to_string_lossy().into_owned());
            }
        }

        if extracted.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }

        Ok(extracted)
    }
}

/// Validate that a tar entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    if path.is_absolute() {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    for component in path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(ExtractionError::PathTraversal {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Ensure every named file under `dir` carries the execute bit.
///
/// No-op on non-Unix platforms.
///
/// # Errors
///
/// Returns an error if reading or updating permissions fails.
#[cfg(unix)]
pub fn ensure_executable(dir: &Utf8Path, names: &[&str]) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for name in names {
        let path = dir.join(name);
        let mut perms = std::fs::metadata(path.as_std_path())?.permissions();
        if perms.mode() & 0o111 == 0 {
            perms.set_mode(perms.mode() | 0o755);
            std::fs::set_permissions(path.as_std_path(), perms)?;
        }
    }
    Ok(())
}

/// Ensure every named file under `dir` carries the execute bit.
///
/// No-op on non-Unix platforms.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub fn ensure_executable(_dir: &Utf8Path, _names: &[&str]) -> std::io::Result<()> {
    Ok(())
}

/// Replace `bin_dir` with the freshly extracted `staging_dir`.
///
/// The previous installation is removed in full before the rename, so the
/// destination only ever holds one complete version.
///
/// # Errors
///
/// Returns an error if removal of the old directory or the rename fails.
pub fn promote_staging(staging_dir: &Utf8Path, bin_dir: &Utf8Path) -> std::io::Result<()> {
    if bin_dir.as_std_path().exists() {
        std::fs::remove_dir_all(bin_dir.as_std_path())?;
    }
    if let Some(parent) = bin_dir.parent() {
        std::fs::create_dir_all(parent.as_std_path())?;
    }
    std::fs::rename(staging_dir.as_std_path(), bin_dir.as_std_path())
}
