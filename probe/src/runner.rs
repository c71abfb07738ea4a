//! Time-bounded execution of a single probe.
//!
//! [`run_probe`] launches the probe's program with stdin closed and both
//! output pipes captured, then waits at most the given budget. Whatever
//! happens (launch failure, non-zero exit, timeout) the call returns a
//! [`RawOutcome`]; it never panics and never outlives the budget by more
//! than the kill grace period.
//!
//! On timeout the child is killed best-effort. A probe that spawned
//! grandchildren may leave them running. Output is collected chunk by chunk
//! against the same deadline, so a grandchild that keeps a pipe open cannot
//! hold the caller: whatever arrived in time is kept.

use std::io::{ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use riskcheck_core::{LaunchFailure, ProbeOutput, RawOutcome};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::definition::{ProbeCommand, ProbeDefinition};

/// Per-probe budget used when neither the probe nor the scan sets one.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// How often a waiting probe re-checks its cancel flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for a killed child to be reaped, and the least time
/// left for draining output after a child exits.
const KILL_GRACE: Duration = Duration::from_millis(250);

/// Stand-in for a budget too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

const PIPE_CHUNK: usize = 8 * 1024;

/// Instant `budget` from now, saturating instead of overflowing.
pub(crate) fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Shared flag that asks in-flight probes to stop early.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs one probe within `budget`.
///
/// A set `cancel` flag is treated like an expired budget.
pub fn run_probe(definition: &ProbeDefinition, budget: Duration, cancel: &CancelFlag) -> RawOutcome {
    let argv = definition.command.argv();
    let started = Instant::now();
    let output = execute(&definition.command, &argv, budget, cancel);
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    debug!(
        check = definition.name(),
        elapsed_ms,
        timed_out = matches!(output, ProbeOutput::TimedOut { .. }),
        "Probe finished"
    );

    RawOutcome {
        check_type: definition.check_type,
        argv,
        output,
        elapsed_ms,
    }
}

/// Runs an arbitrary command under the same budget and kill rules.
pub(crate) fn run_command(command: &ProbeCommand, budget: Duration, cancel: &CancelFlag) -> ProbeOutput {
    execute(command, &command.argv(), budget, cancel)
}

fn execute(
    probe: &ProbeCommand,
    argv: &[String],
    budget: Duration,
    cancel: &CancelFlag,
) -> ProbeOutput {
    let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
    if cancel.is_cancelled() {
        return ProbeOutput::TimedOut { budget_ms };
    }

    let mut command = Command::new(&probe.program);
    command
        .args(&probe.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            let failure = match e.kind() {
                ErrorKind::NotFound => LaunchFailure::NotFound,
                ErrorKind::PermissionDenied => LaunchFailure::PermissionDenied,
                _ => LaunchFailure::Other,
            };
            debug!(command = ?argv, error = %e, "Probe failed to launch");
            return ProbeOutput::LaunchFailed {
                failure,
                message: e.to_string(),
            };
        }
    };

    // Drain both pipes off-thread so a chatty probe cannot fill its pipe
    // buffer and stall before exiting.
    let stdout_chunks = child.stdout.take().map(drain);
    let stderr_chunks = child.stderr.take().map(drain);

    let deadline = deadline_after(budget);
    match wait_with_budget(&mut child, deadline, cancel) {
        Ok(Some(status)) => {
            let drain_deadline = deadline.max(deadline_after(KILL_GRACE));
            ProbeOutput::Exited {
                exit_code: status.code(),
                stdout: collect(stdout_chunks, drain_deadline, argv, "stdout"),
                stderr: collect(stderr_chunks, drain_deadline, argv, "stderr"),
            }
        }
        Ok(None) => {
            warn!(command = ?argv, budget_ms, "Probe exceeded its time budget");
            terminate(&mut child, argv);
            ProbeOutput::TimedOut { budget_ms }
        }
        Err(e) => {
            terminate(&mut child, argv);
            ProbeOutput::LaunchFailed {
                failure: LaunchFailure::Other,
                message: format!("wait failed: {e}"),
            }
        }
    }
}

/// Reads `pipe` on a detached thread, forwarding each chunk as it arrives.
///
/// The channel disconnects at end of file or on a read error.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<std::io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = vec![0u8; PIPE_CHUNK];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Ok(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

/// Gathers drained output until end of file or `deadline`, whichever is first.
fn collect(
    chunks: Option<Receiver<std::io::Result<Vec<u8>>>>,
    deadline: Instant,
    argv: &[String],
    stream: &str,
) -> String {
    let mut buf = Vec::new();
    if let Some(chunks) = chunks {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match chunks.recv_timeout(remaining) {
                Ok(Ok(chunk)) => buf.extend_from_slice(&chunk),
                Ok(Err(e)) => {
                    debug!(command = ?argv, stream, error = %e, "Failed to read probe output");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    debug!(
                        command = ?argv,
                        stream,
                        captured = buf.len(),
                        "Probe output still open at deadline; keeping what arrived"
                    );
                    break;
                }
            }
        }
    }
    let text = String::from_utf8_lossy(&buf);
    text.strip_prefix('\u{feff}').unwrap_or(text.as_ref()).to_string()
}

fn wait_with_budget(
    child: &mut Child,
    deadline: Instant,
    cancel: &CancelFlag,
) -> std::io::Result<Option<ExitStatus>> {
    loop {
        let now = Instant::now();
        if now >= deadline || cancel.is_cancelled() {
            return child.try_wait();
        }
        let slice = (deadline - now).min(POLL_INTERVAL);
        if let Some(status) = child.wait_timeout(slice)? {
            return Ok(Some(status));
        }
    }
}

fn terminate(child: &mut Child, argv: &[String]) {
    if let Err(e) = child.kill() {
        warn!(command = ?argv, error = %e, "Failed to kill probe; it may keep running");
        return;
    }
    match child.wait_timeout(KILL_GRACE) {
        Ok(Some(_)) => {}
        Ok(None) => warn!(command = ?argv, "Killed probe has not exited yet"),
        Err(e) => debug!(command = ?argv, error = %e, "Failed to reap killed probe"),
    }
}

/// First non-empty line of `text`, truncated for logs and error details.
pub(crate) fn output_preview(text: &str) -> Option<String> {
    const MAX_PREVIEW_LEN: usize = 160;

    let first_non_empty = text.lines().map(str::trim).find(|line| !line.is_empty())?;
    if first_non_empty.chars().count() <= MAX_PREVIEW_LEN {
        return Some(first_non_empty.to_string());
    }
    let truncated: String = first_non_empty.chars().take(MAX_PREVIEW_LEN).collect();
    Some(format!("{truncated}..."))
}
