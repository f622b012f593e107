//! Provisioning pipeline orchestration.
//!
//! Drives the full sequence: fetch → verify checksum → verify signature →
//! extract → configure → audit → launch. Stages run strictly in order, each
//! gated on the previous one; any fatal error aborts the run, dropping the
//! scoped download directory and leaving the installation and data
//! directories untouched. A prior verified installation short-circuits the
//! network stages entirely, but only after the cached archive re-hashes to
//! the pinned digest; the state marker alone is never trusted.

use crate::artefact::digest::compute_sha256;
use crate::artefact::download::{HttpDownloader, ReleaseDownloader, with_retry};
use crate::artefact::extraction::{
    GzExtractor, ReleaseExtractor, ensure_executable, promote_staging,
};
use crate::artefact::manifest::ChecksumManifest;
use crate::artefact::signature::{SignatureOutcome, verify_manifest_signature};
use crate::audit;
use crate::cache::{self, CacheState};
use crate::config::{self, CONFIG_FILENAME};
use crate::dirs::InstallLayout;
use crate::error::{ProvisionError, Result};
use crate::launch::{LaunchStatus, Launcher, ProcessLauncher, preflight};
use crate::output::{provisioned_message, write_stamped_line, write_warning};
use crate::release::{CHECKSUMS_FILE, REQUIRED_BINARIES, ReleaseDescriptor, SIGNATURE_FILE};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Inputs for one pipeline run.
pub struct PipelineContext<'a> {
    /// The release to provision.
    pub release: &'a ReleaseDescriptor,
    /// Installation layout.
    pub layout: &'a InstallLayout,
    /// Daemon data directory.
    pub data_dir: &'a Utf8Path,
    /// Skip the advisory signature check entirely.
    pub skip_signature: bool,
    /// Launch the daemon after provisioning.
    pub launch: bool,
    /// Suppress progress output (errors still shown).
    pub quiet: bool,
}

/// Pipeline stages, in execution order. Used for progress lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetching,
    VerifyingChecksum,
    VerifyingSignature,
    Extracting,
    Configuring,
    Auditing,
    Launching,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching release",
            Self::VerifyingChecksum => "verifying checksum",
            Self::VerifyingSignature => "verifying signature",
            Self::Extracting => "extracting archive",
            Self::Configuring => "provisioning configuration",
            Self::Auditing => "auditing security policy",
            Self::Launching => "launching daemon",
        };
        write!(f, "{name}")
    }
}

/// How much assurance the run established about the release's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustLevel {
    /// Checksum and manifest signature both verified.
    Signed,
    /// Only the pinned checksum verified; signature infrastructure was
    /// skipped or unavailable.
    ChecksumOnly {
        /// Why the signature did not verify.
        reason: String,
    },
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signed => write!(f, "signature verified"),
            Self::ChecksumOnly { reason } => write!(f, "checksum only ({reason})"),
        }
    }
}

/// Terminal outcome of a pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Provisioning completed; the daemon was not started.
    Provisioned {
        /// Established trust level.
        trust: TrustLevel,
    },
    /// The daemon ran under supervision and exited.
    Launched {
        /// Exit status of the supervised daemon.
        status: LaunchStatus,
        /// Established trust level.
        trust: TrustLevel,
    },
}

/// Run the pipeline with production implementations.
///
/// On Unix, a successful launch replaces this process and the call never
/// returns.
///
/// # Errors
///
/// Returns the first fatal error encountered; see [`ProvisionError`].
pub fn run(context: &PipelineContext<'_>, stderr: &mut dyn Write) -> Result<PipelineOutcome> {
    run_with(context, &HttpDownloader, &GzExtractor, &ProcessLauncher, stderr)
}

/// Testable pipeline with injected downloader, extractor, and launcher.
///
/// The production entry point [`run`] delegates here with real
/// implementations; tests inject stubs.
///
/// # Errors
///
/// Returns the first fatal error encountered; see [`ProvisionError`].
pub fn run_with(
    context: &PipelineContext<'_>,
    downloader: &dyn ReleaseDownloader,
    extractor: &dyn ReleaseExtractor,
    launcher: &dyn Launcher,
    stderr: &mut dyn Write,
) -> Result<PipelineOutcome> {
    std::fs::create_dir_all(context.layout.root().as_std_path()).map_err(|e| {
        ProvisionError::InstallDir {
            path: context.layout.root().to_owned(),
            reason: e.to_string(),
        }
    })?;

    let (state, recovered) = cache::load(&context.layout.state_path());
    if recovered {
        log::debug!("provisioning state marker was invalid and will be rewritten");
    }

    let trust = if cache_hit(context, &state, stderr) {
        TrustLevel::ChecksumOnly {
            reason: "cached installation re-verified against pinned digest".to_owned(),
        }
    } else {
        provision_release(context, downloader, extractor, stderr)?
    };

    enter(Stage::Configuring, context, stderr);
    let report = config::provision(context.data_dir)?;
    if !context.quiet {
        write_stamped_line(stderr, report.describe());
    }

    enter(Stage::Auditing, context, stderr);
    let audit_report = audit::audit(context.data_dir)?;
    for finding in audit_report.warnings() {
        write_warning(stderr, &finding.detail);
    }
    if let Some(fatal) = audit_report.fatal() {
        return Err(ProvisionError::PolicyViolation {
            detail: fatal.detail.clone(),
        });
    }

    if !context.launch {
        if !context.quiet {
            write_stamped_line(
                stderr,
                provisioned_message(context.release.version(), &context.layout.bin_dir()),
            );
        }
        return Ok(PipelineOutcome::Provisioned { trust });
    }

    enter(Stage::Launching, context, stderr);
    let daemon = context.layout.daemon_path();
    preflight(&daemon)?;
    let config_path = context.data_dir.join(CONFIG_FILENAME);
    let status = launcher.launch(&daemon, &config_path, context.data_dir)?;
    Ok(PipelineOutcome::Launched { status, trust })
}

/// Whether a previous verified installation can be reused as-is.
///
/// Requires the state marker to claim the pinned digest, the daemon binary
/// to be installed, and the cached archive to re-hash to that digest.
fn cache_hit(context: &PipelineContext<'_>, state: &CacheState, stderr: &mut dyn Write) -> bool {
    let expected = context.release.expected_digest();
    if !state.claims_verified(expected) {
        return false;
    }
    if !context.layout.daemon_path().as_std_path().exists() {
        log::debug!("state marker present but daemon binary missing; refetching");
        return false;
    }
    let cached = context
        .layout
        .cached_artefact(&context.release.artefact_filename());
    match compute_sha256(cached.as_std_path()) {
        Ok(actual) if actual == *expected => {
            if !context.quiet {
                write_stamped_line(
                    stderr,
                    format!(
                        "using verified cached release {} at {}",
                        context.release.version(),
                        context.layout.bin_dir()
                    ),
                );
            }
            true
        }
        Ok(_) | Err(_) => {
            log::debug!("cached archive failed re-verification; refetching");
            false
        }
    }
}

/// Fetch, verify, and extract the release; returns the trust level.
fn provision_release(
    context: &PipelineContext<'_>,
    downloader: &dyn ReleaseDownloader,
    extractor: &dyn ReleaseExtractor,
    stderr: &mut dyn Write,
) -> Result<TrustLevel> {
    // The download directory lives exactly as long as this function; its
    // drop removes it on success and on every error path alike.
    let download_dir = tempfile::tempdir()?;

    enter(Stage::Fetching, context, stderr);
    let fetched = fetch_release(context, downloader, download_dir.path())?;

    enter(Stage::VerifyingChecksum, context, stderr);
    verify_checksum(context, &fetched)?;
    retain_verified_archive(context, &fetched)?;

    enter(Stage::VerifyingSignature, context, stderr);
    let trust = establish_trust(context, &fetched, stderr);

    enter(Stage::Extracting, context, stderr);
    extract_release(context, extractor, &fetched.artefact_path)?;

    Ok(trust)
}

/// Files landed in the download directory by the fetch stage.
struct FetchedRelease {
    artefact_path: Utf8PathBuf,
    manifest_path: Utf8PathBuf,
    manifest_text: String,
    signature_path: Option<Utf8PathBuf>,
    signature_failure: Option<String>,
}

/// Fetch the artefact, checksum manifest, and (best-effort) signature.
fn fetch_release(
    context: &PipelineContext<'_>,
    downloader: &dyn ReleaseDownloader,
    download_dir: &Path,
) -> Result<FetchedRelease> {
    let download_dir = Utf8PathBuf::try_from(download_dir.to_path_buf()).map_err(|e| {
        ProvisionError::InstallDir {
            path: Utf8PathBuf::from("<download dir>"),
            reason: format!("download directory is not valid UTF-8: {e}"),
        }
    })?;

    let artefact_path = download_dir.join(context.release.artefact_filename());
    with_retry(|| downloader.fetch_file(&context.release.artefact_url(), artefact_path.as_std_path()))
        .map_err(ProvisionError::Download)?;

    let manifest_path = download_dir.join(CHECKSUMS_FILE);
    with_retry(|| downloader.fetch_file(&context.release.checksums_url(), manifest_path.as_std_path()))
        .map_err(ProvisionError::Download)?;
    let manifest_text = std::fs::read_to_string(manifest_path.as_std_path())?;

    let (signature_path, signature_failure) = if context.skip_signature {
        (None, None)
    } else {
        let path = download_dir.join(SIGNATURE_FILE);
        match with_retry(|| downloader.fetch_file(&context.release.signature_url(), path.as_std_path()))
        {
            Ok(()) => (Some(path), None),
            Err(e) => (None, Some(e.to_string())),
        }
    };

    Ok(FetchedRelease {
        artefact_path,
        manifest_path,
        manifest_text,
        signature_path,
        signature_failure,
    })
}

/// Enforce the double checksum check: pinned digest first, manifest
/// corroboration second. The pinned digest is the sole authority.
fn verify_checksum(context: &PipelineContext<'_>, fetched: &FetchedRelease) -> Result<()> {
    let expected = context.release.expected_digest();
    let file = context.release.artefact_filename();

    let actual = compute_sha256(fetched.artefact_path.as_std_path())?;
    if actual != *expected {
        return Err(ProvisionError::ChecksumMismatch {
            file,
            expected: expected.as_str().to_owned(),
            actual: actual.as_str().to_owned(),
        });
    }

    let manifest = ChecksumManifest::parse(&fetched.manifest_text)?;
    match manifest.digest_for(&file) {
        Some(listed) if listed == expected => Ok(()),
        Some(listed) => Err(ProvisionError::ManifestMismatch {
            file,
            reason: format!(
                "manifest lists {listed}, pinned digest is {expected}"
            ),
        }),
        None => Err(ProvisionError::ManifestMismatch {
            file,
            reason: "no manifest entry for the artefact".to_owned(),
        }),
    }
}

/// Copy the verified archive into the cache and record the state marker.
fn retain_verified_archive(
    context: &PipelineContext<'_>,
    fetched: &FetchedRelease,
) -> Result<()> {
    let cache_dir = context.layout.cache_dir();
    std::fs::create_dir_all(cache_dir.as_std_path())?;
    let cached = context
        .layout
        .cached_artefact(&context.release.artefact_filename());
    std::fs::copy(fetched.artefact_path.as_std_path(), cached.as_std_path())?;

    let state = CacheState::verified(context.release.expected_digest());
    cache::store(&context.layout.state_path(), &state)
}

/// Attempt the advisory signature verification and fold the result into a
/// trust level, warning on any degradation.
fn establish_trust(
    context: &PipelineContext<'_>,
    fetched: &FetchedRelease,
    stderr: &mut dyn Write,
) -> TrustLevel {
    if context.skip_signature {
        return TrustLevel::ChecksumOnly {
            reason: "signature verification disabled".to_owned(),
        };
    }
    let Some(signature_path) = &fetched.signature_path else {
        let reason = fetched
            .signature_failure
            .clone()
            .unwrap_or_else(|| "signature file unavailable".to_owned());
        write_warning(
            stderr,
            format!("release signature unavailable; proceeding on checksum alone: {reason}"),
        );
        return TrustLevel::ChecksumOnly { reason };
    };
    match verify_manifest_signature(
        fetched.manifest_path.as_std_path(),
        signature_path.as_std_path(),
    ) {
        SignatureOutcome::Verified => TrustLevel::Signed,
        SignatureOutcome::Unverified { reason } => {
            write_warning(
                stderr,
                format!("release signature not verified; proceeding on checksum alone: {reason}"),
            );
            TrustLevel::ChecksumOnly { reason }
        }
    }
}

/// Extract into staging, validate the binary set, then promote.
fn extract_release(
    context: &PipelineContext<'_>,
    extractor: &dyn ReleaseExtractor,
    artefact_path: &Utf8Path,
) -> Result<()> {
    let staging = context.layout.staging_dir();
    if staging.as_std_path().exists() {
        std::fs::remove_dir_all(staging.as_std_path())?;
    }
    std::fs::create_dir_all(staging.as_std_path())?;

    let result = extract_into_staging(context, extractor, artefact_path, &staging);
    if result.is_err() {
        let _ = std::fs::remove_dir_all(staging.as_std_path());
    }
    result
}

fn extract_into_staging(
    context: &PipelineContext<'_>,
    extractor: &dyn ReleaseExtractor,
    artefact_path: &Utf8Path,
    staging: &Utf8Path,
) -> Result<()> {
    extractor.extract(artefact_path.as_std_path(), staging.as_std_path())?;

    for name in REQUIRED_BINARIES {
        if !staging.join(name).as_std_path().is_file() {
            return Err(ProvisionError::MissingBinary {
                name: name.to_owned(),
            });
        }
    }
    ensure_executable(staging, &REQUIRED_BINARIES)?;
    promote_staging(staging, &context.layout.bin_dir())?;
    Ok(())
}

/// Log a stage-entry line unless quiet.
fn enter(stage: Stage, context: &PipelineContext<'_>, stderr: &mut dyn Write) {
    if !context.quiet {
        write_stamped_line(stderr, format!("{stage}..."));
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
