//! Risk aggregation over questionnaire answers.
//!
//! The score is a flat count: every "No" answer adds one to its category,
//! with no severity weighting. The overall percentage divides the summed
//! counts by the number of distinct categories answered, so it can exceed
//! 100 when a category holds several "No" answers.
//!
//! Scan results are carried alongside the score for display but never move
//! the percentage.
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use riskcheck_core::*;
//!
//! let answer = |category: &str, yes: bool| QuestionResponse {
//!     question_id: 1,
//!     category: category.to_string(),
//!     subcategory: None,
//!     answer: yes,
//!     notes: None,
//!     timestamp: Utc::now(),
//! };
//!
//! let answers = vec![answer("access", false), answer("backup", true)];
//! let score = compute_risk(&answers, None);
//! assert_eq!(score.percentage, 50.0);
//! assert_eq!(score.level, RiskLevel::Medium);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{CheckType, OverallStatus, ParseEnumError, Question, QuestionResponse, ScanReport};

/// Upper bound (inclusive) of the `Low` band.
pub const LOW_RISK_MAX: f64 = 25.0;
/// Upper bound (inclusive) of the `Medium` band.
pub const MEDIUM_RISK_MAX: f64 = 50.0;
/// Upper bound (inclusive) of the `High` band.
pub const HIGH_RISK_MAX: f64 = 75.0;

/// Risk band derived from the overall percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Buckets a percentage: ≤25 Low, ≤50 Medium, ≤75 High, otherwise Critical.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage <= LOW_RISK_MAX {
            Self::Low
        } else if percentage <= MEDIUM_RISK_MAX {
            Self::Medium
        } else if percentage <= HIGH_RISK_MAX {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseEnumError {
                kind: "risk level",
                value: s.to_string(),
            }),
        }
    }
}

/// Derived risk score for one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Number of "No" answers per category.
    pub per_category: BTreeMap<String, u32>,
    /// Number of distinct categories answered.
    pub category_count: usize,
    pub percentage: f64,
    pub level: RiskLevel,
    /// Overall status of the attached scan, shown next to the score.
    pub scan_status: Option<OverallStatus>,
}

/// Folds answers (and optionally the latest scan report) into a risk score.
pub fn compute_risk(answers: &[QuestionResponse], scan_report: Option<&ScanReport>) -> RiskScore {
    let mut per_category: BTreeMap<String, u32> = BTreeMap::new();
    for response in answers {
        let count = per_category.entry(response.category.clone()).or_insert(0);
        if !response.answer {
            *count += 1;
        }
    }

    let category_count = per_category.len();
    let total: u32 = per_category.values().sum();
    let percentage = if category_count == 0 {
        0.0
    } else {
        f64::from(total) / category_count as f64 * 100.0
    };

    RiskScore {
        per_category,
        category_count,
        percentage,
        level: RiskLevel::from_percentage(percentage),
        scan_status: scan_report.map(ScanReport::overall_status),
    }
}

/// Where a recommendation came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendationSource {
    Question { question_id: i64 },
    Scan { check_type: CheckType },
}

/// One actionable follow-up shown after an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub source: RecommendationSource,
    pub category: String,
    pub title: String,
    pub action: Option<String>,
    pub how_to: Option<String>,
    pub why: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// Builds recommendations: one per "No" answer, then one per unsuccessful
/// scan check.
///
/// Answers whose question is not in `questions` are skipped.
pub fn recommendations(
    answers: &[QuestionResponse],
    questions: &[Question],
    scan_report: Option<&ScanReport>,
) -> Vec<Recommendation> {
    let by_id: BTreeMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();

    let mut out: Vec<Recommendation> = answers
        .iter()
        .filter(|response| !response.answer)
        .filter_map(|response| by_id.get(&response.question_id))
        .map(|question| Recommendation {
            source: RecommendationSource::Question {
                question_id: question.id,
            },
            category: question.category.clone(),
            title: question
                .subcategory
                .clone()
                .unwrap_or_else(|| question.question.clone()),
            action: question.action.clone(),
            how_to: question.how_to.clone(),
            why: question.why.clone(),
            suggestions: Vec::new(),
        })
        .collect();

    if let Some(report) = scan_report {
        out.extend(report.unsuccessful().map(|result| Recommendation {
            source: RecommendationSource::Scan {
                check_type: result.check_type,
            },
            category: "system scan".to_string(),
            title: format!("{} ({})", result.check_type, result.status),
            action: Some(result.message.clone()),
            how_to: None,
            why: None,
            suggestions: result.suggestions.clone(),
        }));
    }

    out
}
