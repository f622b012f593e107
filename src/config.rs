//! Runtime configuration provisioning.
//!
//! Generates, or upgrades in place, the hardened `meridian.conf` the daemon
//! is launched against. A fresh install writes the complete configuration
//! with a new credential and owner-only permissions; an existing config is
//! never rewritten: missing hardening keys are appended and everything else
//! is preserved byte-for-byte, so operator customisations survive and the
//! upgrade is idempotent.

use crate::credential::Credential;
use crate::error::{ProvisionError, Result};
use camino::Utf8Path;
use std::io::Write;

/// Filename of the runtime configuration inside the data directory.
pub const CONFIG_FILENAME: &str = "meridian.conf";

/// Filename of the side file holding the `user:secret` credential.
pub const CREDENTIAL_FILENAME: &str = "rpc.credentials";

/// Owner-only mode for the data directory.
#[cfg(unix)]
pub const DATA_DIR_MODE: u32 = 0o700;

/// Owner-only mode for the config and credential files.
#[cfg(unix)]
pub const SECURE_FILE_MODE: u32 = 0o600;

/// Hardening keys every provisioned configuration must carry.
///
/// `listen` and `dnsseed` isolate the node from the public network,
/// `rpcbind`/`rpcallowip` confine the control plane to loopback, and
/// `datacarrier=0` disables arbitrary-payload relay entirely.
pub const HARDENING_KEYS: [(&str, &str); 5] = [
    ("listen", "0"),
    ("dnsseed", "0"),
    ("rpcbind", "127.0.0.1"),
    ("rpcallowip", "127.0.0.1/32"),
    ("datacarrier", "0"),
];

/// What the provisioner did to the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigReport {
    /// No config existed; a complete one was written with a new credential.
    Created {
        /// Username the credential was generated for.
        user: String,
    },
    /// A config existed; listed hardening keys were appended to it.
    Upgraded {
        /// Key names appended during the upgrade; empty when the config
        /// already carried every hardening key.
        appended: Vec<String>,
    },
}

impl ConfigReport {
    /// One-line description for the operator.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Created { user } => {
                format!("wrote hardened configuration with new credential for {user}")
            }
            Self::Upgraded { appended } if appended.is_empty() => {
                "existing configuration already hardened; no changes".to_owned()
            }
            Self::Upgraded { appended } => {
                format!("appended missing hardening keys: {}", appended.join(", "))
            }
        }
    }
}

/// Provision the data directory and runtime configuration.
///
/// Creates the data directory owner-only if absent, then either writes a
/// complete hardened config plus the side credential file, or upgrades an
/// existing config in place.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, a file cannot be
/// written, or secret generation fails.
pub fn provision(data_dir: &Utf8Path) -> Result<ConfigReport> {
    ensure_data_dir(data_dir)?;

    let config_path = data_dir.join(CONFIG_FILENAME);
    if config_path.as_std_path().exists() {
        let appended = upgrade_existing(&config_path)?;
        return Ok(ConfigReport::Upgraded { appended });
    }

    let credential = Credential::generate()?;
    write_secure(&config_path, render_config(&credential).as_bytes())?;

    let credential_path = data_dir.join(CREDENTIAL_FILENAME);
    write_secure(&credential_path, credential.file_line().as_bytes())?;

    Ok(ConfigReport::Created {
        user: credential.user,
    })
}

/// Create the data directory with owner-only permissions if it is missing.
fn ensure_data_dir(data_dir: &Utf8Path) -> Result<()> {
    if data_dir.as_std_path().is_dir() {
        return Ok(());
    }
    create_private_dir(data_dir).map_err(|source| ProvisionError::DataDir {
        path: data_dir.to_owned(),
        source,
    })
}

#[cfg(unix)]
fn create_private_dir(dir: &Utf8Path) -> std::io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(DATA_DIR_MODE)
        .create(dir.as_std_path())?;
    // Pre-existing parents are left alone; the final directory must be
    // owner-only even if umask widened it at creation.
    let mut perms = std::fs::metadata(dir.as_std_path())?.permissions();
    perms.set_mode(DATA_DIR_MODE);
    std::fs::set_permissions(dir.as_std_path(), perms)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Utf8Path) -> std::io::Result<()> {
    log::debug!(
        "owner-only directory mode not enforced for {dir}: unsupported on this platform"
    );
    std::fs::create_dir_all(dir.as_std_path())
}

/// Render the complete configuration for a fresh install.
fn render_config(credential: &Credential) -> String {
    let mut text = String::from("# Generated by meridian-provisioner; edit freely.\n");
    for (key, value) in HARDENING_KEYS {
        text.push_str(&format!("{key}={value}\n"));
    }
    text.push_str(&format!("rpcuser={}\n", credential.user));
    text.push_str(&format!("rpcpassword={}\n", credential.secret));
    text
}

/// Append any missing hardening keys to an existing config.
///
/// Returns the key names appended, in [`HARDENING_KEYS`] order. The scan is
/// comment-aware: `#` lines and blank lines are skipped, and a key counts as
/// present whatever value it carries; the audit, not the provisioner,
/// judges values.
fn upgrade_existing(config_path: &Utf8Path) -> Result<Vec<String>> {
    let contents =
        std::fs::read_to_string(config_path.as_std_path()).map_err(|source| {
            ProvisionError::ConfigWrite {
                path: config_path.to_owned(),
                source,
            }
        })?;

    let missing: Vec<(&str, &str)> = HARDENING_KEYS
        .iter()
        .copied()
        .filter(|(key, _)| key_value(&contents, key).is_none())
        .collect();

    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let mut appended_block = String::new();
    if !contents.is_empty() && !contents.ends_with('\n') {
        appended_block.push('\n');
    }
    for (key, value) in &missing {
        appended_block.push_str(&format!("{key}={value}\n"));
    }

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(config_path.as_std_path())
        .map_err(|source| ProvisionError::ConfigWrite {
            path: config_path.to_owned(),
            source,
        })?;
    file.write_all(appended_block.as_bytes())
        .map_err(|source| ProvisionError::ConfigWrite {
            path: config_path.to_owned(),
            source,
        })?;

    Ok(missing.iter().map(|(key, _)| (*key).to_owned()).collect())
}

/// Return the value of `key` in `key=value` config text, if present.
///
/// Used by both the upgrade scan and the security audit.
#[must_use]
pub fn key_value<'a>(contents: &'a str, key: &str) -> Option<&'a str> {
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, value)) = line.split_once('=') {
            if name.trim() == key {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Write `contents` to `path` with owner-only permissions from creation.
#[cfg(unix)]
fn write_secure(path: &Utf8Path, contents: &[u8]) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let io_err = |source| ProvisionError::ConfigWrite {
        path: path.to_owned(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(SECURE_FILE_MODE)
        .open(path.as_std_path())
        .map_err(io_err)?;
    file.write_all(contents).map_err(io_err)
}

/// Write `contents` to `path`; permission narrowing is unsupported here.
#[cfg(not(unix))]
fn write_secure(path: &Utf8Path, contents: &[u8]) -> Result<()> {
    log::debug!("owner-only file mode not enforced for {path}: unsupported on this platform");
    std::fs::write(path.as_std_path(), contents).map_err(|source| ProvisionError::ConfigWrite {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
