//! CLI argument definitions for the Meridian provisioner.
//!
//! This module defines the command-line interface using clap. It is
//! separated from the main entrypoint to keep the binary small and focused
//! on orchestration.

use camino::Utf8PathBuf;
use clap::Parser;

/// Provision and launch a verified Meridian node release.
#[derive(Parser, Debug, Clone)]
#[command(name = "meridian-provisioner")]
#[command(version, about)]
#[command(long_about = concat!(
    "Provision and launch a verified Meridian node release.\n\n",
    "The provisioner downloads the pinned release archive together with its ",
    "checksum manifest and detached signature, verifies the archive against ",
    "the digest compiled into this binary, extracts and validates the node ",
    "executables, writes a hardened configuration with a freshly generated ",
    "RPC credential, audits the result against the security policy, and ",
    "finally starts the daemon bound to that configuration.\n\n",
    "A previously verified installation is reused without touching the ",
    "network; the cached archive is re-hashed first, so stale or tampered ",
    "state always triggers a fresh download.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Provision and launch the pinned release:\n",
    "    $ meridian-provisioner\n\n",
    "  Provision only, without starting the daemon:\n",
    "    $ meridian-provisioner --no-launch\n\n",
    "  Use a distribution mirror:\n",
    "    $ meridian-provisioner --base-url https://mirror.example/releases\n\n",
    "  Preview the run without side effects:\n",
    "    $ meridian-provisioner --dry-run\n\n",
    "ENVIRONMENT:\n",
    "  MERIDIAN_RPC_USER   Username for the generated RPC credential\n",
    "  MERIDIAN_DATA_DIR   Daemon data directory\n",
))]
pub struct Cli {
    /// Installation root for binaries, cache, and state [default:
    /// platform-specific].
    #[arg(short, long, value_name = "DIR")]
    pub install_dir: Option<Utf8PathBuf>,

    /// Daemon data directory [default: <install-dir>/data].
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<Utf8PathBuf>,

    /// Override the distribution base URL (mirror support).
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Provision and audit only; do not start the daemon.
    #[arg(long)]
    pub no_launch: bool,

    /// Skip the advisory release-signature verification.
    #[arg(long)]
    pub skip_signature: bool,

    /// Show the resolved configuration and exit without side effects.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase diagnostic verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Default for Cli {
    /// A `Cli` with every flag disabled and no overrides, for programmatic
    /// construction in tests.
    fn default() -> Self {
        Self {
            install_dir: None,
            data_dir: None,
            base_url: None,
            no_launch: false,
            skip_signature: false,
            dry_run: false,
            verbosity: 0,
            quiet: false,
        }
    }
}
