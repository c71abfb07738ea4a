//! Data model for security self-assessments.
//!
//! This module defines the values that flow between the probe runner, the
//! result normalizer, the scan coordinator and the storage layer. The types
//! are designed for serialization with [`serde`] so they can round-trip
//! through JSON columns in SQLite and through the CLI's JSON output.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error returned when a stored or user-supplied label does not name a
/// known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Human-readable name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Kind of local system security check.
///
/// The set is closed: every check type has its own payload shape and
/// interpretation rule, so adding one means extending the normalizer's
/// exhaustive match.
///
/// # Examples
///
/// ```
/// use riskcheck_core::CheckType;
///
/// assert_eq!(CheckType::ALL.len(), 6);
/// assert_eq!("firewall".parse::<CheckType>().unwrap(), CheckType::Firewall);
/// assert_eq!(CheckType::Encryption.to_string(), "encryption");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    /// Real-time antivirus protection.
    Antivirus,
    /// Pending operating system updates.
    Updates,
    /// Host firewall profiles.
    Firewall,
    /// Backup and restore facilities.
    Backup,
    /// Disk encryption per fixed volume.
    Encryption,
    /// Network adapter, DNS and connection posture.
    Network,
}

impl CheckType {
    /// All check types in canonical order.
    pub const ALL: [CheckType; 6] = [
        CheckType::Antivirus,
        CheckType::Updates,
        CheckType::Firewall,
        CheckType::Backup,
        CheckType::Encryption,
        CheckType::Network,
    ];

    /// Returns the snake_case label used in storage and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Antivirus => "antivirus",
            Self::Updates => "updates",
            Self::Firewall => "firewall",
            Self::Backup => "backup",
            Self::Encryption => "encryption",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|check| check.as_str() == needle)
            .ok_or_else(|| ParseEnumError::new("check type", s))
    }
}

/// Status of one normalized check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Success,
    Warning,
    Error,
    Timeout,
    /// Some, but not all, sub-checks returned usable data.
    Partial,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Partial => "partial",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "timeout" => Ok(Self::Timeout),
            "partial" => Ok(Self::Partial),
            _ => Err(ParseEnumError::new("check status", s)),
        }
    }
}

/// Aggregate status of a whole scan.
///
/// # Examples
///
/// ```
/// use riskcheck_core::{CheckStatus, OverallStatus};
///
/// let all_ok = [CheckStatus::Success, CheckStatus::Success];
/// assert_eq!(OverallStatus::from_statuses(all_ok), OverallStatus::Completed);
///
/// let mixed = [CheckStatus::Success, CheckStatus::Timeout];
/// assert_eq!(OverallStatus::from_statuses(mixed), OverallStatus::Partial);
///
/// let none_ok = [CheckStatus::Warning, CheckStatus::Error];
/// assert_eq!(OverallStatus::from_statuses(none_ok), OverallStatus::Failed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every check succeeded.
    Completed,
    /// At least one check succeeded and at least one did not.
    Partial,
    /// No check succeeded.
    Failed,
}

impl OverallStatus {
    /// Derives the aggregate status from per-check statuses.
    ///
    /// Only [`CheckStatus::Success`] counts as succeeded. An empty set is
    /// `Failed`, since nothing succeeded.
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = CheckStatus>,
    {
        let mut succeeded = 0usize;
        let mut other = 0usize;
        for status in statuses {
            if status.is_success() {
                succeeded += 1;
            } else {
                other += 1;
            }
        }

        match (succeeded, other) {
            (0, _) => Self::Failed,
            (_, 0) => Self::Completed,
            _ => Self::Partial,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverallStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseEnumError::new("overall status", s)),
        }
    }
}

/// Uniform result of one check, whatever the probe produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub check_type: CheckType,
    pub status: CheckStatus,
    /// Human-readable summary.
    pub message: String,
    /// Check-specific structured payload, or failure diagnostics.
    #[serde(default)]
    pub details: Value,
    /// Actionable hints for the user (e.g. "run as administrator").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl NormalizedResult {
    /// Creates a result with empty details, stamped with the current time.
    pub fn new(check_type: CheckType, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            check_type,
            status,
            message: message.into(),
            details: Value::Null,
            suggestions: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    /// Compares everything except the timestamp.
    pub fn same_outcome(&self, other: &Self) -> bool {
        self.check_type == other.check_type
            && self.status == other.status
            && self.message == other.message
            && self.details == other.details
            && self.suggestions == other.suggestions
    }
}

/// Why an external probe process could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchFailure {
    /// The utility is not installed or not on the search path.
    NotFound,
    /// The OS refused to start the utility.
    PermissionDenied,
    /// Any other spawn or wait failure.
    Other,
}

/// What happened to one external probe invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeOutput {
    /// The process exited within its budget.
    Exited {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The process could not be started or waited on.
    LaunchFailed {
        failure: LaunchFailure,
        message: String,
    },
    /// The budget elapsed (or the scan was cancelled) before exit.
    TimedOut { budget_ms: u64 },
}

/// Raw product of one probe invocation, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutcome {
    pub check_type: CheckType,
    /// Program and arguments that were executed.
    pub argv: Vec<String>,
    pub output: ProbeOutput,
    pub elapsed_ms: u64,
}

impl RawOutcome {
    /// Returns `true` when the outcome is a timeout.
    pub fn timed_out(&self) -> bool {
        matches!(self.output, ProbeOutput::TimedOut { .. })
    }
}

/// Aggregate result of one scan run.
///
/// Constructed once through [`ScanReport::new`], which derives the overall
/// status from the per-check results; the report is read-only afterwards.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use chrono::Utc;
/// use riskcheck_core::*;
///
/// let mut per_check = BTreeMap::new();
/// per_check.insert(
///     CheckType::Firewall,
///     NormalizedResult::new(CheckType::Firewall, CheckStatus::Success, "enabled"),
/// );
/// per_check.insert(
///     CheckType::Updates,
///     NormalizedResult::new(CheckType::Updates, CheckStatus::Warning, "3 pending"),
/// );
///
/// let now = Utc::now();
/// let report = ScanReport::new("scan-1", now, now, per_check);
/// assert_eq!(report.overall_status(), OverallStatus::Partial);
/// assert_eq!(report.len(), 2);
/// assert_eq!(report.count(CheckStatus::Warning), 1);
/// ```
///
/// Deserializing goes through [`ScanReport::new`], so a stored
/// `overall_status` is recomputed from the checks rather than trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScanReportFields")]
pub struct ScanReport {
    scan_id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    per_check: BTreeMap<CheckType, NormalizedResult>,
    overall_status: OverallStatus,
}

impl ScanReport {
    pub fn new(
        scan_id: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        per_check: BTreeMap<CheckType, NormalizedResult>,
    ) -> Self {
        let overall_status = OverallStatus::from_statuses(per_check.values().map(|r| r.status));
        Self {
            scan_id: scan_id.into(),
            started_at,
            finished_at,
            per_check,
            overall_status,
        }
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn per_check(&self) -> &BTreeMap<CheckType, NormalizedResult> {
        &self.per_check
    }

    pub fn overall_status(&self) -> OverallStatus {
        self.overall_status
    }

    pub fn get(&self, check_type: CheckType) -> Option<&NormalizedResult> {
        self.per_check.get(&check_type)
    }

    pub fn len(&self) -> usize {
        self.per_check.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_check.is_empty()
    }

    /// Number of checks with the given status.
    pub fn count(&self, status: CheckStatus) -> usize {
        self.per_check
            .values()
            .filter(|result| result.status == status)
            .count()
    }

    /// Checks whose status is anything other than success.
    pub fn unsuccessful(&self) -> impl Iterator<Item = &NormalizedResult> {
        self.per_check
            .values()
            .filter(|result| !result.status.is_success())
    }
}

#[derive(Deserialize)]
struct ScanReportFields {
    scan_id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    per_check: BTreeMap<CheckType, NormalizedResult>,
}

impl From<ScanReportFields> for ScanReport {
    fn from(fields: ScanReportFields) -> Self {
        Self::new(
            fields.scan_id,
            fields.started_at,
            fields.finished_at,
            fields.per_check,
        )
    }
}

/// A company being assessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a [`Company`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

/// A stored questionnaire question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub category: String,
    pub subcategory: Option<String>,
    pub question: String,
    /// What to do when the answer is "No".
    pub action: Option<String>,
    pub how_to: Option<String>,
    pub why: Option<String>,
}

/// Input for seeding a [`Question`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub category: String,
    pub subcategory: Option<String>,
    pub question: String,
    pub action: Option<String>,
    pub how_to: Option<String>,
    pub why: Option<String>,
}

/// One yes/no answer to a questionnaire question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question_id: i64,
    pub category: String,
    pub subcategory: Option<String>,
    /// `true` for "Yes", `false` for "No".
    pub answer: bool,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl QuestionResponse {
    /// Builds an answer to `question`, stamped with the current time.
    pub fn new(question: &Question, answer: bool) -> Self {
        Self {
            question_id: question.id,
            category: question.category.clone(),
            subcategory: question.subcategory.clone(),
            answer,
            notes: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_type_labels_match_serde() {
        for check in CheckType::ALL {
            let json = serde_json::to_string(&check).unwrap();
            assert_eq!(json, format!("\"{}\"", check.as_str()));
            assert_eq!(check.as_str().parse::<CheckType>().unwrap(), check);
        }
    }

    #[test]
    fn test_unknown_check_type_is_rejected() {
        let err = "antimalware".parse::<CheckType>().unwrap_err();
        assert_eq!(err.kind, "check type");
        assert_eq!(err.to_string(), "unknown check type: antimalware");
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            CheckStatus::Success,
            CheckStatus::Warning,
            CheckStatus::Error,
            CheckStatus::Timeout,
            CheckStatus::Partial,
        ] {
            assert_eq!(status.as_str().parse::<CheckStatus>().unwrap(), status);
        }
        assert!("pending".parse::<CheckStatus>().is_err());
    }

    #[test]
    fn test_overall_status_treats_partial_check_as_unsuccessful() {
        let statuses = [CheckStatus::Success, CheckStatus::Partial];
        assert_eq!(OverallStatus::from_statuses(statuses), OverallStatus::Partial);
        assert_eq!(
            OverallStatus::from_statuses(Vec::<CheckStatus>::new()),
            OverallStatus::Failed
        );
    }

    #[test]
    fn test_scan_report_serializes_check_types_as_keys() {
        let mut per_check = BTreeMap::new();
        per_check.insert(
            CheckType::Antivirus,
            NormalizedResult::new(CheckType::Antivirus, CheckStatus::Success, "on"),
        );
        let now = Utc::now();
        let report = ScanReport::new("abc", now, now, per_check);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["per_check"]["antivirus"].is_object());
        assert_eq!(json["overall_status"], "completed");

        let back: ScanReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_deserialized_report_rederives_overall_status() {
        let mut per_check = BTreeMap::new();
        per_check.insert(
            CheckType::Firewall,
            NormalizedResult::new(CheckType::Firewall, CheckStatus::Error, "Firewall is disabled"),
        );
        let now = Utc::now();
        let report = ScanReport::new("s-9", now, now, per_check);

        let mut json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall_status"], "failed");
        json["overall_status"] = "completed".into();

        let loaded: ScanReport = serde_json::from_value(json).unwrap();
        assert_eq!(loaded.overall_status(), OverallStatus::Failed);
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_same_outcome_ignores_timestamp() {
        let a = NormalizedResult::new(CheckType::Backup, CheckStatus::Error, "missing");
        let mut b = a.clone();
        b.timestamp = a.timestamp + chrono::Duration::seconds(5);
        assert!(a.same_outcome(&b));
        b.message.push('!');
        assert!(!a.same_outcome(&b));
    }

    #[test]
    fn test_probe_output_is_tagged() {
        let output = ProbeOutput::TimedOut { budget_ms: 1500 };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["kind"], "timed_out");
        assert_eq!(json["budget_ms"], 1500);
    }
}
