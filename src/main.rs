//! Meridian provisioner CLI entrypoint.
//!
//! This binary fetches the pinned Meridian release, verifies and extracts
//! it, provisions a hardened runtime configuration, audits the result, and
//! launches the daemon. On Unix a successful launch replaces this process;
//! otherwise the daemon's exit status becomes this process's exit status.

use clap::Parser;
use meridian_provisioner::cli::Cli;
use meridian_provisioner::dirs::{BaseDirs, InstallLayout, SystemBaseDirs, resolve_data_dir};
use meridian_provisioner::error::{ProvisionError, Result};
use meridian_provisioner::launch::LaunchStatus;
use meridian_provisioner::output::{write_stamped_line, write_stderr_line, write_warning};
use meridian_provisioner::pipeline::{PipelineContext, PipelineOutcome, run};
use meridian_provisioner::release::ReleaseDescriptor;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run_provisioner(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run_provisioner(cli: &Cli, stderr: &mut dyn Write) -> Result<i32> {
    let release = resolve_release(cli)?;
    let layout = resolve_layout(cli, &SystemBaseDirs)?;
    let data_dir = resolve_data_dir(&layout, cli.data_dir.clone());

    if cli.dry_run {
        print_dry_run_info(cli, &release, &layout, &data_dir, stderr);
        return Ok(0);
    }

    let context = PipelineContext {
        release: &release,
        layout: &layout,
        data_dir: &data_dir,
        skip_signature: cli.skip_signature,
        launch: !cli.no_launch,
        quiet: cli.quiet,
    };

    match run(&context, stderr)? {
        PipelineOutcome::Provisioned { trust } => {
            if !cli.quiet {
                write_stamped_line(stderr, format!("trust level: {trust}"));
            }
            Ok(0)
        }
        PipelineOutcome::Launched {
            status: LaunchStatus::Exited { code },
            ..
        } => {
            if code != 0 {
                write_warning(stderr, format!("daemon exited with status {code}"));
            }
            Ok(code)
        }
    }
}

/// Build the release descriptor, applying any mirror override.
fn resolve_release(cli: &Cli) -> Result<ReleaseDescriptor> {
    let release = ReleaseDescriptor::pinned()?;
    Ok(match cli.base_url.as_deref() {
        Some(base_url) => release.with_base_url(base_url),
        None => release,
    })
}

/// Determine the installation layout from the CLI or the platform default.
fn resolve_layout(cli: &Cli, dirs: &dyn BaseDirs) -> Result<InstallLayout> {
    let root = cli
        .install_dir
        .clone()
        .or_else(|| dirs.install_root())
        .ok_or_else(|| ProvisionError::InstallDir {
            path: camino::Utf8PathBuf::from("<unresolved>"),
            reason: "could not determine a platform install directory".to_owned(),
        })?;
    Ok(InstallLayout::new(root))
}

/// Print the resolved run configuration without side effects.
fn print_dry_run_info(
    cli: &Cli,
    release: &ReleaseDescriptor,
    layout: &InstallLayout,
    data_dir: &camino::Utf8Path,
    stderr: &mut dyn Write,
) {
    write_stderr_line(stderr, "Dry run - no files will be modified");
    write_stderr_line(stderr, "");
    write_stderr_line(stderr, format!("Release version: {}", release.version()));
    write_stderr_line(stderr, format!("Artefact URL: {}", release.artefact_url()));
    write_stderr_line(
        stderr,
        format!("Checksum manifest URL: {}", release.checksums_url()),
    );
    write_stderr_line(
        stderr,
        format!("Pinned digest: {}", release.expected_digest()),
    );
    write_stderr_line(stderr, format!("Install root: {}", layout.root()));
    write_stderr_line(stderr, format!("Data directory: {data_dir}"));
    write_stderr_line(stderr, format!("Skip signature: {}", cli.skip_signature));
    write_stderr_line(stderr, format!("Launch daemon: {}", !cli.no_launch));
    write_stderr_line(stderr, format!("Verbosity level: {}", cli.verbosity));
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stamped_line(stderr, format!("provisioning failed: {err}"));
            1
        }
    }
}
