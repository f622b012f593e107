//! Directory resolution and installation layout.
//!
//! A [`BaseDirs`] trait abstracts the platform data directory so tests can
//! pin the install root to a scratch location. [`InstallLayout`] derives
//! every path the pipeline touches from that single root, keeping path
//! construction out of the stage logic.

use crate::cache::STATE_FILENAME;
use crate::release::DAEMON_BINARY;
use camino::{Utf8Path, Utf8PathBuf};

/// Environment variable overriding the daemon data directory.
pub const DATA_DIR_ENV: &str = "MERIDIAN_DATA_DIR";

/// Trait for resolving the platform-specific install root.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The per-user directory Meridian is installed under, if resolvable.
    fn install_root(&self) -> Option<Utf8PathBuf>;
}

/// Production resolver backed by the platform's local data directory
/// (for example `~/.local/share/meridian` on Linux).
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn install_root(&self) -> Option<Utf8PathBuf> {
        directories_next::BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::try_from(dirs.data_local_dir().to_path_buf()).ok())
            .map(|dir| dir.join("meridian"))
    }
}

/// Paths of one Meridian installation, all derived from the install root.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use meridian_provisioner::dirs::InstallLayout;
///
/// let layout = InstallLayout::new(Utf8PathBuf::from("/opt/meridian"));
/// assert_eq!(layout.daemon_path().as_str(), "/opt/meridian/bin/meridiand");
/// ```
#[derive(Debug, Clone)]
pub struct InstallLayout {
    root: Utf8PathBuf,
}

impl InstallLayout {
    /// Create a layout rooted at `root`.
    #[must_use]
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// The install root itself.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory holding the extracted executables.
    #[must_use]
    pub fn bin_dir(&self) -> Utf8PathBuf {
        self.root.join("bin")
    }

    /// Scratch directory extraction targets before promotion into
    /// [`bin_dir`](Self::bin_dir).
    #[must_use]
    pub fn staging_dir(&self) -> Utf8PathBuf {
        self.root.join(".staging")
    }

    /// Directory retaining the verified release archive.
    #[must_use]
    pub fn cache_dir(&self) -> Utf8PathBuf {
        self.root.join("cache")
    }

    /// Path of the retained archive for `filename`.
    #[must_use]
    pub fn cached_artefact(&self, filename: &str) -> Utf8PathBuf {
        self.cache_dir().join(filename)
    }

    /// Path of the provisioning state marker.
    #[must_use]
    pub fn state_path(&self) -> Utf8PathBuf {
        self.root.join(STATE_FILENAME)
    }

    /// Path of the installed daemon executable.
    #[must_use]
    pub fn daemon_path(&self) -> Utf8PathBuf {
        self.bin_dir().join(DAEMON_BINARY)
    }

    /// Default daemon data directory under this installation.
    #[must_use]
    pub fn default_data_dir(&self) -> Utf8PathBuf {
        self.root.join("data")
    }
}

/// Resolve the daemon data directory.
///
/// Precedence: explicit CLI value, then the `MERIDIAN_DATA_DIR` environment
/// variable, then the layout default.
#[must_use]
pub fn resolve_data_dir(layout: &InstallLayout, cli_override: Option<Utf8PathBuf>) -> Utf8PathBuf {
    if let Some(dir) = cli_override {
        return dir;
    }
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => Utf8PathBuf::from(dir.trim()),
        _ => layout.default_data_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> InstallLayout {
        InstallLayout::new(Utf8PathBuf::from("/opt/meridian"))
    }

    #[test]
    fn layout_paths_hang_off_the_root() {
        let layout = layout();
        assert_eq!(layout.bin_dir().as_str(), "/opt/meridian/bin");
        assert_eq!(layout.cache_dir().as_str(), "/opt/meridian/cache");
        assert_eq!(
            layout.state_path().as_str(),
            "/opt/meridian/provision-state.json"
        );
        assert_eq!(layout.daemon_path().as_str(), "/opt/meridian/bin/meridiand");
    }

    #[test]
    fn cached_artefact_lands_in_cache_dir() {
        let path = layout().cached_artefact("meridian-0.3.1-x86_64-linux-gnu.tar.gz");
        assert!(path.as_str().starts_with("/opt/meridian/cache/"));
        assert!(path.as_str().ends_with(".tar.gz"));
    }

    #[test]
    fn cli_override_wins_over_environment() {
        temp_env::with_var(DATA_DIR_ENV, Some("/env/data"), || {
            let resolved = resolve_data_dir(&layout(), Some(Utf8PathBuf::from("/cli/data")));
            assert_eq!(resolved.as_str(), "/cli/data");
        });
    }

    #[test]
    fn environment_wins_over_default() {
        temp_env::with_var(DATA_DIR_ENV, Some("/env/data"), || {
            let resolved = resolve_data_dir(&layout(), None);
            assert_eq!(resolved.as_str(), "/env/data");
        });
    }

    #[test]
    fn default_applies_when_nothing_is_set() {
        temp_env::with_var_unset(DATA_DIR_ENV, || {
            let resolved = resolve_data_dir(&layout(), None);
            assert_eq!(resolved.as_str(), "/opt/meridian/data");
        });
    }

    #[test]
    fn blank_environment_value_is_ignored() {
        temp_env::with_var(DATA_DIR_ENV, Some("  "), || {
            let resolved = resolve_data_dir(&layout(), None);
            assert_eq!(resolved.as_str(), "/opt/meridian/data");
        });
    }
}
