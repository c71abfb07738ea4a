//! Concurrent fan-out of all configured probes under one global deadline.
//!
//! Every probe runs on its own worker in a dedicated rayon pool and reports
//! back over a channel. The coordinator collects results until either all
//! probes have settled or the global deadline passes. On the deadline it
//! merges: results that already arrived are kept as they are, and only the
//! probes still outstanding get a synthetic timeout. It then raises the
//! shared [`CancelFlag`] so those runners kill their children, without
//! waiting for them.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use chrono::Utc;
use riskcheck_core::{CheckType, LaunchFailure, NormalizedResult, ProbeOutput, RawOutcome, ScanReport};
use tracing::{info, warn};
use uuid::Uuid;

use crate::definition::ProbeSet;
use crate::normalize::normalize;
use crate::runner::{CancelFlag, DEFAULT_PROBE_TIMEOUT, deadline_after, run_probe};

/// Default deadline for a whole scan.
pub const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Timing configuration for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Budget for each probe that does not set its own.
    pub probe_timeout: Duration,
    /// Deadline for the whole fan-out.
    pub global_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            global_timeout: DEFAULT_GLOBAL_TIMEOUT,
        }
    }
}

/// The finalized report plus the raw outcome behind every entry.
#[derive(Debug, Clone)]
pub struct ScanRun {
    pub report: ScanReport,
    pub raw_outcomes: BTreeMap<CheckType, RawOutcome>,
}

type Settled = BTreeMap<CheckType, (RawOutcome, NormalizedResult)>;

/// Runs every probe in `probes` concurrently and assembles a [`ScanReport`].
///
/// The report always holds exactly one entry per probe. No probe is retried;
/// a retry is a fresh call.
pub fn run_scan(probes: &ProbeSet, config: &ScanConfig) -> ScanRun {
    let scan_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let deadline = deadline_after(config.global_timeout);
    let cancel = CancelFlag::new();

    info!(
        scan_id = %scan_id,
        probes = probes.len(),
        global_timeout_ms = u64::try_from(config.global_timeout.as_millis()).unwrap_or(u64::MAX),
        "Starting system scan"
    );

    let (tx, rx) = mpsc::channel::<(RawOutcome, NormalizedResult)>();
    let mut settled = Settled::new();
    let mut unsettled_reason = Unsettled::TimedOut;

    match rayon::ThreadPoolBuilder::new()
        .num_threads(probes.len().max(1))
        .thread_name(|index| format!("riskcheck-probe-{index}"))
        .panic_handler(|_| warn!("Probe worker panicked; its check is reported as failed"))
        .build()
    {
        Ok(pool) => {
            for definition in probes {
                let definition = definition.clone();
                let budget = definition.budget(config.probe_timeout);
                let tx = tx.clone();
                let cancel = cancel.clone();
                pool.spawn(move || {
                    let outcome = run_probe(&definition, budget, &cancel);
                    let result = normalize(definition.check_type, &outcome);
                    // The receiver is gone once the global deadline has passed.
                    let _ = tx.send((outcome, result));
                });
            }
            drop(tx);

            loop {
                if settled.len() == probes.len() {
                    break;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                match rx.recv_timeout(deadline - now) {
                    Ok((outcome, result)) => {
                        settled.insert(outcome.check_type, (outcome, result));
                    }
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        unsettled_reason = Unsettled::WorkerLost;
                        break;
                    }
                }
            }
            // Results that landed right at the deadline still count.
            while let Ok((outcome, result)) = rx.try_recv() {
                settled.insert(outcome.check_type, (outcome, result));
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to build probe worker pool");
            drop(tx);
            unsettled_reason = Unsettled::PoolUnavailable(e.to_string());
        }
    }

    let outstanding: Vec<CheckType> = probes
        .iter()
        .map(|p| p.check_type)
        .filter(|check| !settled.contains_key(check))
        .collect();
    if !outstanding.is_empty() {
        cancel.cancel();
        warn!(
            scan_id = %scan_id,
            outstanding = ?outstanding,
            "Probes did not settle before the scan deadline"
        );
    }

    for definition in probes {
        if settled.contains_key(&definition.check_type) {
            continue;
        }
        let budget = match unsettled_reason {
            Unsettled::TimedOut => config.global_timeout,
            _ => Duration::ZERO,
        };
        let outcome = RawOutcome {
            check_type: definition.check_type,
            argv: definition.command.argv(),
            output: unsettled_reason.output(budget),
            elapsed_ms: u64::try_from(config.global_timeout.as_millis()).unwrap_or(u64::MAX),
        };
        let result = normalize(definition.check_type, &outcome);
        settled.insert(definition.check_type, (outcome, result));
    }

    let mut per_check = BTreeMap::new();
    let mut raw_outcomes = BTreeMap::new();
    for (check_type, (outcome, result)) in settled {
        per_check.insert(check_type, result);
        raw_outcomes.insert(check_type, outcome);
    }

    let report = ScanReport::new(scan_id, started_at, Utc::now(), per_check);
    info!(
        scan_id = %report.scan_id(),
        overall_status = %report.overall_status(),
        checks = report.len(),
        "System scan finished"
    );

    ScanRun {
        report,
        raw_outcomes,
    }
}

/// Why a probe has no result when collection stops.
enum Unsettled {
    TimedOut,
    WorkerLost,
    PoolUnavailable(String),
}

impl Unsettled {
    fn output(&self, budget: Duration) -> ProbeOutput {
        match self {
            Self::TimedOut => ProbeOutput::TimedOut {
                budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            },
            Self::WorkerLost => ProbeOutput::LaunchFailed {
                failure: LaunchFailure::Other,
                message: "probe worker exited without reporting a result".to_string(),
            },
            Self::PoolUnavailable(reason) => ProbeOutput::LaunchFailed {
                failure: LaunchFailure::Other,
                message: format!("probe worker pool unavailable: {reason}"),
            },
        }
    }
}
