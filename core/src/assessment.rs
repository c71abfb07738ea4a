//! The assessment aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::risk::{RiskScore, compute_risk};
use crate::types::{QuestionResponse, ScanReport};

/// Errors raised when mutating an [`Assessment`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssessmentError {
    /// A scan report was already attached to this assessment.
    #[error("assessment {assessment_id} already has scan report {scan_id}")]
    ScanAlreadyAttached { assessment_id: i64, scan_id: String },
}

/// One run of the questionnaire plus system scan for a company.
///
/// Answers are appended as the user goes; the scan report can be attached
/// once. The risk score has no setter and is recomputed from the answers on
/// every call to [`risk_score`](Self::risk_score).
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use riskcheck_core::*;
///
/// let question = Question {
///     id: 7,
///     category: "Access".into(),
///     subcategory: None,
///     question: "Does everyone have a personal account?".into(),
///     action: None,
///     how_to: None,
///     why: None,
/// };
///
/// let mut assessment = Assessment::new(1, 42, Utc::now());
/// assessment.record_answer(QuestionResponse::new(&question, false));
/// assert_eq!(assessment.risk_score().level, RiskLevel::Critical);
///
/// // Changing the answer replaces the earlier one.
/// assessment.record_answer(QuestionResponse::new(&question, true));
/// assert_eq!(assessment.answers().len(), 1);
/// assert_eq!(assessment.risk_score().level, RiskLevel::Low);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    id: i64,
    company_id: i64,
    started_at: DateTime<Utc>,
    answers: Vec<QuestionResponse>,
    scan_report: Option<ScanReport>,
}

impl Assessment {
    pub fn new(id: i64, company_id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            company_id,
            started_at,
            answers: Vec::new(),
            scan_report: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn company_id(&self) -> i64 {
        self.company_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn answers(&self) -> &[QuestionResponse] {
        &self.answers
    }

    pub fn scan_report(&self) -> Option<&ScanReport> {
        self.scan_report.as_ref()
    }

    /// Appends an answer, replacing any earlier answer to the same question
    /// in its original position.
    pub fn record_answer(&mut self, response: QuestionResponse) {
        match self
            .answers
            .iter_mut()
            .find(|existing| existing.question_id == response.question_id)
        {
            Some(existing) => *existing = response,
            None => self.answers.push(response),
        }
    }

    /// Attaches the finalized scan report. Only the first call succeeds.
    pub fn attach_scan_report(&mut self, report: ScanReport) -> Result<(), AssessmentError> {
        if let Some(existing) = &self.scan_report {
            return Err(AssessmentError::ScanAlreadyAttached {
                assessment_id: self.id,
                scan_id: existing.scan_id().to_string(),
            });
        }
        self.scan_report = Some(report);
        Ok(())
    }

    pub fn risk_score(&self) -> RiskScore {
        compute_risk(&self.answers, self.scan_report.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::types::OverallStatus;

    #[test]
    fn test_scan_report_attaches_once() {
        let now = Utc::now();
        let mut assessment = Assessment::new(3, 1, now);
        let report = ScanReport::new("first", now, now, BTreeMap::new());
        assessment.attach_scan_report(report).unwrap();

        let second = ScanReport::new("second", now, now, BTreeMap::new());
        let err = assessment.attach_scan_report(second).unwrap_err();
        assert_eq!(
            err,
            AssessmentError::ScanAlreadyAttached {
                assessment_id: 3,
                scan_id: "first".into()
            }
        );
        assert_eq!(assessment.scan_report().unwrap().scan_id(), "first");
        assert_eq!(
            assessment.risk_score().scan_status,
            Some(OverallStatus::Failed)
        );
    }
}
