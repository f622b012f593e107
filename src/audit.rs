//! Post-provisioning security audit.
//!
//! Read-only evaluation of the provisioned data directory and configuration
//! against the fixed security policy. Every deviation produces a finding;
//! only the content-policy flag is load-bearing: the pipeline refuses to
//! launch without it, while everything else (permission modes, RPC scope)
//! is advisory because it may be unfixable without elevated privileges.

use crate::config::{CONFIG_FILENAME, key_value};
use crate::error::Result;
use camino::Utf8Path;

/// Severity of an audit finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Advisory; reported but never blocks the launch.
    Warning,
    /// The pipeline must not launch while this holds.
    Fatal,
}

/// One violated policy condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFinding {
    /// Finding severity.
    pub severity: Severity,
    /// Human-readable description of the violation.
    pub detail: String,
}

/// The outcome of a policy audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    findings: Vec<AuditFinding>,
}

impl AuditReport {
    /// All findings, in evaluation order.
    #[must_use]
    pub fn findings(&self) -> &[AuditFinding] {
        &self.findings
    }

    /// Advisory findings only.
    pub fn warnings(&self) -> impl Iterator<Item = &AuditFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    /// The first fatal finding, if any.
    #[must_use]
    pub fn fatal(&self) -> Option<&AuditFinding> {
        self.findings.iter().find(|f| f.severity == Severity::Fatal)
    }

    /// Whether the audit found nothing at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    fn warn(&mut self, detail: impl Into<String>) {
        self.findings.push(AuditFinding {
            severity: Severity::Warning,
            detail: detail.into(),
        });
    }

    fn fail(&mut self, detail: impl Into<String>) {
        self.findings.push(AuditFinding {
            severity: Severity::Fatal,
            detail: detail.into(),
        });
    }
}

/// Audit the provisioned state under `data_dir`.
///
/// # Errors
///
/// Returns an error only if the configuration file cannot be read; policy
/// deviations are reported as findings, not errors.
pub fn audit(data_dir: &Utf8Path) -> Result<AuditReport> {
    let mut report = AuditReport::default();

    audit_directory_mode(data_dir, &mut report);

    let config_path = data_dir.join(CONFIG_FILENAME);
    audit_file_mode(&config_path, &mut report);

    let contents = std::fs::read_to_string(config_path.as_std_path())?;
    audit_rpc_scope(&contents, &mut report);
    audit_content_policy(&contents, &mut report);

    Ok(report)
}

/// Check the data directory is owner-only.
#[cfg(unix)]
fn audit_directory_mode(data_dir: &Utf8Path, report: &mut AuditReport) {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(data_dir.as_std_path()) {
        Ok(metadata) => {
            let mode = metadata.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                report.warn(format!(
                    "data directory {data_dir} has mode {mode:o}; expected owner-only 700"
                ));
            }
        }
        Err(e) => report.warn(format!("could not stat data directory {data_dir}: {e}")),
    }
}

#[cfg(not(unix))]
fn audit_directory_mode(data_dir: &Utf8Path, _report: &mut AuditReport) {
    log::debug!("directory mode audit skipped for {data_dir}: unsupported on this platform");
}

/// Check the config file is owner-only.
#[cfg(unix)]
fn audit_file_mode(config_path: &Utf8Path, report: &mut AuditReport) {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(config_path.as_std_path()) {
        Ok(metadata) => {
            let mode = metadata.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                report.warn(format!(
                    "config file {config_path} has mode {mode:o}; expected owner-only 600"
                ));
            }
        }
        Err(e) => report.warn(format!("could not stat config file {config_path}: {e}")),
    }
}

#[cfg(not(unix))]
fn audit_file_mode(config_path: &Utf8Path, _report: &mut AuditReport) {
    log::debug!("file mode audit skipped for {config_path}: unsupported on this platform");
}

/// Check the RPC interface is confined to loopback.
fn audit_rpc_scope(contents: &str, report: &mut AuditReport) {
    match key_value(contents, "rpcbind") {
        Some("127.0.0.1") => {}
        Some(other) => report.warn(format!("rpcbind={other}; expected loopback 127.0.0.1")),
        None => report.warn("rpcbind is unset; the RPC interface may bind widely"),
    }
    match key_value(contents, "rpcallowip") {
        Some(value) if value.starts_with("127.") => {}
        Some(other) => report.warn(format!("rpcallowip={other}; expected a loopback range")),
        None => report.warn("rpcallowip is unset; remote RPC clients may be admitted"),
    }
}

/// Check the mandatory content-policy flag.
fn audit_content_policy(contents: &str, report: &mut AuditReport) {
    match key_value(contents, "datacarrier") {
        Some("0") => {}
        Some(other) => report.fail(format!("datacarrier={other}; must be 0")),
        None => report.fail("datacarrier flag absent; must be present and 0"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use camino::Utf8PathBuf;

    fn provisioned_data_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let data_dir = Utf8PathBuf::try_from(temp.path().join("data")).expect("utf-8 path");
        config::provision(&data_dir).expect("provision");
        (temp, data_dir)
    }

    #[test]
    fn freshly_provisioned_state_is_clean() {
        let (_temp, data_dir) = provisioned_data_dir();
        let report = audit(&data_dir).expect("audit");
        assert!(report.is_clean(), "unexpected findings: {:?}", report.findings());
    }

    #[test]
    fn missing_content_policy_flag_is_fatal() {
        let (_temp, data_dir) = provisioned_data_dir();
        let config_path = data_dir.join(CONFIG_FILENAME);
        let stripped: String = std::fs::read_to_string(config_path.as_std_path())
            .expect("read")
            .lines()
            .filter(|line| !line.starts_with("datacarrier="))
            .map(|line| format!("{line}\n"))
            .collect();
        std::fs::write(config_path.as_std_path(), stripped).expect("write");

        let report = audit(&data_dir).expect("audit");
        let fatal = report.fatal().expect("fatal finding");
        assert!(fatal.detail.contains("datacarrier"));
    }

    #[test]
    fn enabled_content_policy_flag_is_fatal() {
        let mut report = AuditReport::default();
        audit_content_policy("datacarrier=1\n", &mut report);
        assert!(report.fatal().is_some());
    }

    #[test]
    fn wide_rpc_bind_is_a_warning_not_fatal() {
        let mut report = AuditReport::default();
        audit_rpc_scope("rpcbind=0.0.0.0\nrpcallowip=10.0.0.0/8\n", &mut report);
        assert!(report.fatal().is_none());
        assert_eq!(report.warnings().count(), 2);
    }

    #[test]
    fn unset_rpc_keys_warn() {
        let mut report = AuditReport::default();
        audit_rpc_scope("listen=0\n", &mut report);
        assert_eq!(report.warnings().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn widened_config_mode_warns() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, data_dir) = provisioned_data_dir();
        let config_path = data_dir.join(CONFIG_FILENAME);
        let mut perms = std::fs::metadata(config_path.as_std_path())
            .expect("metadata")
            .permissions();
        perms.set_mode(0o644);
        std::fs::set_permissions(config_path.as_std_path(), perms).expect("chmod");

        let report = audit(&data_dir).expect("audit");
        assert!(report.fatal().is_none());
        assert!(
            report
                .warnings()
                .any(|f| f.detail.contains("config file") && f.detail.contains("644"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn widened_data_dir_mode_warns() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, data_dir) = provisioned_data_dir();
        let mut perms = std::fs::metadata(data_dir.as_std_path())
            .expect("metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(data_dir.as_std_path(), perms).expect("chmod");

        let report = audit(&data_dir).expect("audit");
        assert!(report.fatal().is_none());
        assert!(report.warnings().any(|f| f.detail.contains("data directory")));
    }
}
