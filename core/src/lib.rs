//! Core types, risk aggregation and validation for security self-assessments.
//!
//! This crate defines the foundational values shared by the probe runner,
//! the storage layer and the CLI:
//!
//! - [`CheckType`], [`CheckStatus`] and [`OverallStatus`]: the closed status
//!   vocabulary of the system scan.
//! - [`RawOutcome`] / [`ProbeOutput`]: what one external probe produced.
//! - [`NormalizedResult`]: the uniform `{status, message, details}` shape.
//! - [`ScanReport`]: one entry per configured check plus a derived overall
//!   status.
//! - [`Assessment`] and [`QuestionResponse`]: questionnaire answers with a
//!   derived [`RiskScore`].
//!
//! Risk aggregation ([`compute_risk`]) counts "No" answers per category and
//! buckets the result into a [`RiskLevel`]. Validation
//! ([`validate_new_company`], [`validate_answers`]) catches bad input before
//! it reaches storage.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use chrono::Utc;
//! use riskcheck_core::*;
//!
//! let mut per_check = BTreeMap::new();
//! for check in CheckType::ALL {
//!     per_check.insert(check, NormalizedResult::new(check, CheckStatus::Success, "ok"));
//! }
//! let now = Utc::now();
//! let report = ScanReport::new("scan-1", now, now, per_check);
//! assert_eq!(report.overall_status(), OverallStatus::Completed);
//!
//! let mut assessment = Assessment::new(1, 1, now);
//! assessment.attach_scan_report(report).unwrap();
//! assert_eq!(assessment.risk_score().level, RiskLevel::Low);
//! ```

mod assessment;
mod risk;
mod types;
mod validate;

pub use assessment::{Assessment, AssessmentError};
pub use risk::{
    HIGH_RISK_MAX, LOW_RISK_MAX, MEDIUM_RISK_MAX, Recommendation, RecommendationSource,
    RiskLevel, RiskScore, compute_risk, recommendations,
};
pub use types::*;
pub use validate::{MAX_COMPANY_NAME_LEN, ValidationError, validate_answers, validate_new_company};
