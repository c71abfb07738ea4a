//! Bounded, failure-tolerant system security scans.
//!
//! This crate runs the local security probes (antivirus, updates, firewall,
//! backup, encryption, network) as external processes and turns whatever they
//! produce into one [`ScanReport`](riskcheck_core::ScanReport).
//!
//! # Main entry points
//!
//! - [`run_scan`]: fan out every probe in a [`ProbeSet`] concurrently under a
//!   global deadline and merge the results.
//! - [`run_probe`]: run a single probe within a time budget.
//! - [`normalize`]: interpret one raw outcome; never fails.
//! - [`default_probes`]: the built-in probes for the current platform.
//! - [`run_environment_diagnostics`]: check that probes can run at all.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use riskcheck_core::{CheckType, OverallStatus};
//! use riskcheck_probe::{ProbeCommand, ProbeDefinition, ScanConfig, default_probes, run_scan};
//!
//! let probes = default_probes().with_override(ProbeDefinition::new(
//!     CheckType::Firewall,
//!     ProbeCommand::new("sh", ["-c", "echo 'Status: active'"]),
//! ));
//! let config = ScanConfig {
//!     probe_timeout: Duration::from_secs(15),
//!     global_timeout: Duration::from_secs(45),
//! };
//!
//! let run = run_scan(&probes, &config);
//! assert_eq!(run.report.len(), 6);
//! if run.report.overall_status() != OverallStatus::Completed {
//!     for result in run.report.unsuccessful() {
//!         eprintln!("{}: {}", result.check_type, result.message);
//!     }
//! }
//! ```

pub mod coordinator;
pub mod definition;
pub mod diagnostics;
pub mod normalize;
pub mod payload;
pub mod profile;
pub mod runner;
pub mod scripts;

pub use coordinator::{DEFAULT_GLOBAL_TIMEOUT, ScanConfig, ScanRun, run_scan};
pub use definition::{ProbeCommand, ProbeDefinition, ProbeSet, ProbeSetError};
pub use diagnostics::{DiagnosticEntry, run_environment_diagnostics};
pub use normalize::{INVALID_STATUS_DATA, normalize};
pub use payload::{CheckPayload, PayloadError, parse_payload};
pub use runner::{CancelFlag, DEFAULT_PROBE_TIMEOUT, run_probe};
pub use scripts::{default_command, default_probes};
