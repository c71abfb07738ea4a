//! Environment self-test: can this machine run the probes at all?

use std::fs;
use std::path::Path;
use std::time::Duration;

use riskcheck_core::{CheckStatus, ProbeOutput};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::definition::ProbeCommand;
use crate::runner::{CancelFlag, output_preview, run_command};

const WRITE_TEST_FILE: &str = ".riskcheck-write-test";

/// Outcome of one diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEntry {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl DiagnosticEntry {
    pub fn new(name: impl Into<String>, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Runs the shell, administrative-rights and disk-write diagnostics.
pub fn run_environment_diagnostics(data_dir: &Path, timeout: Duration) -> Vec<DiagnosticEntry> {
    vec![
        check_shell(timeout),
        check_admin_rights(timeout),
        check_disk_access(data_dir),
    ]
}

#[cfg(windows)]
fn shell_command() -> ProbeCommand {
    crate::scripts::powershell("$PSVersionTable.PSVersion.ToString()".to_string())
}

#[cfg(not(windows))]
fn shell_command() -> ProbeCommand {
    ProbeCommand::new(crate::scripts::SH, ["-c", "uname -sr"])
}

#[cfg(windows)]
fn admin_command() -> ProbeCommand {
    crate::scripts::powershell(
        "([Security.Principal.WindowsPrincipal][Security.Principal.WindowsIdentity]::GetCurrent()).IsInRole([Security.Principal.WindowsBuiltInRole]::Administrator)"
            .to_string(),
    )
}

#[cfg(not(windows))]
fn admin_command() -> ProbeCommand {
    ProbeCommand::new(crate::scripts::SH, ["-c", "id -u"])
}

fn check_shell(timeout: Duration) -> DiagnosticEntry {
    const NAME: &str = "shell";
    match capture_stdout(&shell_command(), timeout) {
        Ok(stdout) => DiagnosticEntry::new(NAME, CheckStatus::Success, "Probe shell is available")
            .with_details(json!({ "version": stdout.trim() })),
        Err(failure) => failure.named(NAME, "Probe shell"),
    }
}

fn check_admin_rights(timeout: Duration) -> DiagnosticEntry {
    const NAME: &str = "admin_rights";
    match capture_stdout(&admin_command(), timeout) {
        Ok(stdout) => {
            let answer = stdout.trim();
            let is_admin = answer == "0" || answer.eq_ignore_ascii_case("true");
            let entry = if is_admin {
                DiagnosticEntry::new(NAME, CheckStatus::Success, "Running with administrative rights")
            } else {
                DiagnosticEntry::new(
                    NAME,
                    CheckStatus::Warning,
                    "Not running with administrative rights; some checks may report errors",
                )
            };
            entry.with_details(json!({ "output": answer }))
        }
        Err(failure) => failure.named(NAME, "Administrative rights check"),
    }
}

fn check_disk_access(data_dir: &Path) -> DiagnosticEntry {
    const NAME: &str = "disk_access";
    let probe_path = data_dir.join(WRITE_TEST_FILE);
    let result = fs::create_dir_all(data_dir)
        .and_then(|()| fs::write(&probe_path, b"riskcheck"))
        .and_then(|()| fs::remove_file(&probe_path));

    let entry = match result {
        Ok(()) => DiagnosticEntry::new(NAME, CheckStatus::Success, "Data directory is writable"),
        Err(e) => {
            debug!(path = %data_dir.display(), error = %e, "Data directory write test failed");
            DiagnosticEntry::new(
                NAME,
                CheckStatus::Error,
                format!("Data directory is not writable: {e}"),
            )
        }
    };
    entry.with_details(json!({ "path": data_dir.display().to_string() }))
}

/// A failed diagnostic command, before it is given a name.
struct Failure {
    status: CheckStatus,
    reason: String,
}

impl Failure {
    fn named(self, name: &str, label: &str) -> DiagnosticEntry {
        DiagnosticEntry::new(name, self.status, format!("{label} {}", self.reason))
    }
}

/// Runs `command` and returns its stdout when it exits cleanly.
fn capture_stdout(command: &ProbeCommand, timeout: Duration) -> Result<String, Failure> {
    match run_command(command, timeout, &CancelFlag::new()) {
        ProbeOutput::Exited {
            exit_code: Some(0),
            stdout,
            ..
        } => Ok(stdout),
        ProbeOutput::Exited {
            exit_code, stderr, ..
        } => Err(Failure {
            status: CheckStatus::Error,
            reason: match (exit_code, output_preview(&stderr)) {
                (Some(code), Some(err)) => format!("exited with status {code}: {err}"),
                (Some(code), None) => format!("exited with status {code}"),
                (None, _) => "was terminated by a signal".to_string(),
            },
        }),
        ProbeOutput::LaunchFailed { message, .. } => Err(Failure {
            status: CheckStatus::Error,
            reason: format!("could not be started: {message}"),
        }),
        ProbeOutput::TimedOut { budget_ms } => Err(Failure {
            status: CheckStatus::Timeout,
            reason: format!("did not answer within {budget_ms} ms"),
        }),
    }
}
