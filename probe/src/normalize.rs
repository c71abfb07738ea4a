//! Maps raw probe outcomes into the uniform [`NormalizedResult`] shape.
//!
//! [`normalize`] is total: launch failures, timeouts, non-zero exits and
//! unparseable payloads all become an `Error` or `Timeout` result rather than
//! an `Err`. It is also pure apart from the result timestamp, so normalizing
//! the same outcome twice yields the same status, message and details.
//!
//! Interpretation per check:
//!
//! | Check | Success when | Otherwise |
//! |---|---|---|
//! | antivirus | real-time protection is on | Error |
//! | updates | zero pending updates | Warning with the count |
//! | firewall | at least one profile is enabled | Error |
//! | backup, encryption, network | every sub-check returned data | Partial if some did, Error if none |

use riskcheck_core::{CheckStatus, CheckType, NormalizedResult, ProbeOutput, RawOutcome};
use serde_json::{Value, json};

use crate::payload::{CheckPayload, PayloadError, SubCheckPayload, parse_payload};
use crate::profile::{
    CheckProfile, INVALID_DATA_SUGGESTIONS, TIMEOUT_SUGGESTIONS, launch_suggestions, profile,
};
use crate::runner::output_preview;

/// Message used for every payload that fails structural parsing.
pub const INVALID_STATUS_DATA: &str = "invalid status data";

/// Normalizes one raw outcome. Never fails.
///
/// # Examples
///
/// ```
/// use riskcheck_core::*;
/// use riskcheck_probe::normalize;
///
/// let outcome = RawOutcome {
///     check_type: CheckType::Updates,
///     argv: vec!["probe".into()],
///     output: ProbeOutput::Exited {
///         exit_code: Some(0),
///         stdout: r#"{"pending_count": 2}"#.into(),
///         stderr: String::new(),
///     },
///     elapsed_ms: 12,
/// };
/// let result = normalize(CheckType::Updates, &outcome);
/// assert_eq!(result.status, CheckStatus::Warning);
/// assert_eq!(result.message, "2 pending updates");
/// ```
pub fn normalize(check_type: CheckType, outcome: &RawOutcome) -> NormalizedResult {
    let profile = profile(check_type);
    match &outcome.output {
        ProbeOutput::LaunchFailed { failure, message } => NormalizedResult::new(
            check_type,
            CheckStatus::Error,
            format!("{} check could not be started: {message}", profile.label),
        )
        .with_details(json!({ "failure": failure, "argv": outcome.argv }))
        .with_suggestions(launch_suggestions(*failure).iter().copied()),

        ProbeOutput::TimedOut { budget_ms } => NormalizedResult::new(
            check_type,
            CheckStatus::Timeout,
            format!("{} check did not finish within {budget_ms} ms", profile.label),
        )
        .with_details(json!({ "budget_ms": budget_ms }))
        .with_suggestions(TIMEOUT_SUGGESTIONS.iter().copied()),

        ProbeOutput::Exited {
            exit_code: Some(0),
            stdout,
            ..
        } => match parse_payload(check_type, stdout) {
            Ok(payload) => interpret(profile, payload),
            Err(PayloadError::Reported { message, details }) => NormalizedResult::new(
                check_type,
                CheckStatus::Error,
                format!("{} check reported an error: {message}", profile.label),
            )
            .with_details(json!({ "error": message, "details": details }))
            .with_suggestions(profile.suggestions.iter().copied()),
            Err(e) => invalid_data(check_type, &e, stdout),
        },

        ProbeOutput::Exited {
            exit_code,
            stdout,
            stderr,
        } => exit_failure(profile, *exit_code, stdout, stderr),
    }
}

fn exit_failure(
    profile: &CheckProfile,
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> NormalizedResult {
    let status_text = match exit_code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    };
    // A probe may still explain itself through an error envelope.
    let reason = match parse_payload(profile.check_type, stdout) {
        Err(PayloadError::Reported { message, .. }) => Some(message),
        _ => output_preview(stderr),
    };
    let message = match reason {
        Some(reason) => format!("{} check {status_text}: {reason}", profile.label),
        None => format!("{} check {status_text}", profile.label),
    };

    NormalizedResult::new(profile.check_type, CheckStatus::Error, message)
        .with_details(json!({
            "exit_code": exit_code,
            "stdout": output_preview(stdout),
            "stderr": output_preview(stderr),
        }))
        .with_suggestions(INVALID_DATA_SUGGESTIONS.iter().copied())
}

fn invalid_data(check_type: CheckType, error: &PayloadError, stdout: &str) -> NormalizedResult {
    NormalizedResult::new(check_type, CheckStatus::Error, INVALID_STATUS_DATA)
        .with_details(json!({
            "error": error.to_string(),
            "output": output_preview(stdout),
        }))
        .with_suggestions(INVALID_DATA_SUGGESTIONS.iter().copied())
}

fn interpret(profile: &CheckProfile, payload: CheckPayload) -> NormalizedResult {
    let check_type = profile.check_type;
    let details = serde_json::to_value(&payload).unwrap_or(Value::Null);

    let (status, message) = match &payload {
        CheckPayload::Antivirus(av) if av.real_time_protection_enabled => {
            (CheckStatus::Success, profile.healthy.to_string())
        }
        CheckPayload::Antivirus(_) => (CheckStatus::Error, profile.unhealthy.to_string()),

        CheckPayload::Updates(updates) => match updates.pending_count {
            0 => (CheckStatus::Success, profile.healthy.to_string()),
            1 => (CheckStatus::Warning, "1 pending update".to_string()),
            n => (CheckStatus::Warning, format!("{n} pending updates")),
        },

        CheckPayload::Firewall(firewall) => {
            let enabled: Vec<&str> = firewall.enabled_profiles().map(|p| p.name.as_str()).collect();
            if enabled.is_empty() {
                (CheckStatus::Error, profile.unhealthy.to_string())
            } else {
                (
                    CheckStatus::Success,
                    format!("{} ({})", profile.healthy, enabled.join(", ")),
                )
            }
        }

        CheckPayload::Backup(sub) | CheckPayload::Encryption(sub) | CheckPayload::Network(sub) => {
            sub_check_status(profile, sub)
        }
    };

    let result = NormalizedResult::new(check_type, status, message).with_details(details);
    if status.is_success() {
        result
    } else {
        result.with_suggestions(profile.suggestions.iter().copied())
    }
}

fn sub_check_status(profile: &CheckProfile, payload: &SubCheckPayload) -> (CheckStatus, String) {
    let total = payload.checks.len();
    let usable = payload.usable().count();
    if total == 0 || usable == 0 {
        (CheckStatus::Error, profile.unhealthy.to_string())
    } else if usable == total {
        (CheckStatus::Success, profile.healthy.to_string())
    } else {
        let missing: Vec<&str> = payload.unusable().map(|c| c.name.as_str()).collect();
        (
            CheckStatus::Partial,
            format!(
                "{} ({usable} of {total} available; missing: {})",
                profile.partial,
                missing.join(", ")
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskcheck_core::LaunchFailure;

    fn exited(check_type: CheckType, code: i32, stdout: &str) -> RawOutcome {
        RawOutcome {
            check_type,
            argv: vec!["probe".into()],
            output: ProbeOutput::Exited {
                exit_code: Some(code),
                stdout: stdout.into(),
                stderr: String::new(),
            },
            elapsed_ms: 5,
        }
    }

    #[test]
    fn test_antivirus_rules() {
        let on = exited(CheckType::Antivirus, 0, r#"{"RealTimeProtectionEnabled":true}"#);
        assert_eq!(normalize(CheckType::Antivirus, &on).status, CheckStatus::Success);

        let off = exited(CheckType::Antivirus, 0, r#"{"RealTimeProtectionEnabled":false}"#);
        let result = normalize(CheckType::Antivirus, &off);
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.details["real_time_protection_enabled"], false);
        assert!(!result.suggestions.is_empty());
    }

    #[test]
    fn test_updates_zero_pending_is_success() {
        let outcome = exited(CheckType::Updates, 0, r#"{"pending_count":0}"#);
        let result = normalize(CheckType::Updates, &outcome);
        assert_eq!(result.status, CheckStatus::Success);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_firewall_needs_one_enabled_profile() {
        let off = exited(
            CheckType::Firewall,
            0,
            r#"[{"Name":"Domain","Enabled":0},{"Name":"Public","Enabled":0}]"#,
        );
        assert_eq!(normalize(CheckType::Firewall, &off).status, CheckStatus::Error);

        let on = exited(CheckType::Firewall, 0, "Status: active\n");
        let result = normalize(CheckType::Firewall, &on);
        assert_eq!(result.status, CheckStatus::Success);
        assert_eq!(result.message, "Firewall is enabled (ufw)");
    }

    #[test]
    fn test_sub_checks_partial_and_error() {
        let partial = exited(
            CheckType::Network,
            0,
            r#"{"checks":[{"name":"adapters"},{"name":"dns","available":false}]}"#,
        );
        let result = normalize(CheckType::Network, &partial);
        assert_eq!(result.status, CheckStatus::Partial);
        assert!(result.message.contains("1 of 2"));
        assert!(result.message.contains("dns"));

        let none = exited(CheckType::Backup, 0, r#"{"checks":[]}"#);
        assert_eq!(normalize(CheckType::Backup, &none).status, CheckStatus::Error);

        let all = exited(CheckType::Encryption, 0, r#"{"checks":{"name":"C:","data":{"protected":true}}}"#);
        assert_eq!(normalize(CheckType::Encryption, &all).status, CheckStatus::Success);
    }

    #[test]
    fn test_malformed_payload_is_invalid_status_data() {
        let outcome = exited(CheckType::Antivirus, 0, "{not json");
        let result = normalize(CheckType::Antivirus, &outcome);
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.message, INVALID_STATUS_DATA);
        assert!(
            result.details["error"]
                .as_str()
                .unwrap()
                .starts_with("malformed JSON")
        );
    }

    #[test]
    fn test_wrong_shape_is_invalid_status_data() {
        let outcome = exited(CheckType::Updates, 0, r#"{"status":"success","data":[1,2,3]}"#);
        let result = normalize(CheckType::Updates, &outcome);
        assert_eq!(result.message, INVALID_STATUS_DATA);
    }

    #[test]
    fn test_reported_error_envelope() {
        let outcome = exited(
            CheckType::Encryption,
            0,
            r#"{"status":"error","error":"Encryption check failed","details":"denied"}"#,
        );
        let result = normalize(CheckType::Encryption, &outcome);
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(
            result.message,
            "Encryption check reported an error: Encryption check failed"
        );
        assert_eq!(result.details["details"], "denied");
    }

    #[test]
    fn test_non_zero_exit_is_error_with_message() {
        let outcome = RawOutcome {
            check_type: CheckType::Backup,
            argv: vec!["probe".into()],
            output: ProbeOutput::Exited {
                exit_code: Some(2),
                stdout: String::new(),
                stderr: "wbadmin: access is denied\n".into(),
            },
            elapsed_ms: 5,
        };
        let result = normalize(CheckType::Backup, &outcome);
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(
            result.message,
            "Backup check exited with status 2: wbadmin: access is denied"
        );
        assert_eq!(result.details["exit_code"], 2);
    }

    #[test]
    fn test_launch_failure_and_timeout() {
        let launch = RawOutcome {
            check_type: CheckType::Antivirus,
            argv: vec!["powershell.exe".into()],
            output: ProbeOutput::LaunchFailed {
                failure: LaunchFailure::PermissionDenied,
                message: "permission denied".into(),
            },
            elapsed_ms: 0,
        };
        let result = normalize(CheckType::Antivirus, &launch);
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.suggestions, vec!["Run riskcheck as administrator".to_string()]);

        let timeout = RawOutcome {
            check_type: CheckType::Updates,
            argv: vec!["probe".into()],
            output: ProbeOutput::TimedOut { budget_ms: 2000 },
            elapsed_ms: 2000,
        };
        let result = normalize(CheckType::Updates, &timeout);
        assert_eq!(result.status, CheckStatus::Timeout);
        assert_eq!(result.message, "Updates check did not finish within 2000 ms");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let outcomes = [
            exited(CheckType::Firewall, 0, "State ON\n"),
            exited(CheckType::Updates, 0, "garbage"),
            exited(CheckType::Network, 1, r#"{"status":"error","error":"boom"}"#),
        ];
        for outcome in &outcomes {
            let first = normalize(outcome.check_type, outcome);
            let second = normalize(outcome.check_type, outcome);
            assert!(first.same_outcome(&second), "{first:?} != {second:?}");
        }
    }
}
