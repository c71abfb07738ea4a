//! Input validation for companies and questionnaire answers.
//!
//! Catches problems such as blank company names, answers to unknown
//! questions, and answers filed under the wrong category before they reach
//! storage or distort the risk score.
//!
//! # Examples
//!
//! ```
//! use riskcheck_core::*;
//!
//! let company = NewCompany { name: "Acme".into(), industry: None, size: None };
//! assert!(validate_new_company(&company).is_empty());
//!
//! let blank = NewCompany { name: "   ".into(), industry: None, size: None };
//! assert_eq!(validate_new_company(&blank), vec![ValidationError::EmptyCompanyName]);
//! ```

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::{NewCompany, Question, QuestionResponse};

/// Maximum accepted length of a company name, in characters.
pub const MAX_COMPANY_NAME_LEN: usize = 200;

/// Validation errors.
///
/// Each variant describes one specific problem. The `Display` impl provides a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Company name is empty or whitespace-only.
    #[error("company name cannot be empty")]
    EmptyCompanyName,
    /// Company name exceeds [`MAX_COMPANY_NAME_LEN`].
    #[error("company name is longer than 200 characters")]
    CompanyNameTooLong,
    /// Answer refers to a question id that does not exist.
    #[error("answer refers to unknown question id {0}")]
    UnknownQuestion(i64),
    /// Answer category differs from the question's category.
    #[error("answer to question {question_id} filed under '{found}', expected '{expected}'")]
    CategoryMismatch {
        question_id: i64,
        expected: String,
        found: String,
    },
    /// Two answers target the same question.
    #[error("duplicate answer for question id {0}")]
    DuplicateAnswer(i64),
}

/// Validates the input for a new company.
pub fn validate_new_company(company: &NewCompany) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let name = company.name.trim();
    if name.is_empty() {
        errors.push(ValidationError::EmptyCompanyName);
    } else if name.chars().count() > MAX_COMPANY_NAME_LEN {
        errors.push(ValidationError::CompanyNameTooLong);
    }
    errors
}

/// Validates answers against the stored questions.
///
/// # Examples
///
/// ```
/// use riskcheck_core::*;
///
/// let question = Question {
///     id: 1,
///     category: "Basics".into(),
///     subcategory: None,
///     question: "Is antivirus installed?".into(),
///     action: None,
///     how_to: None,
///     why: None,
/// };
/// let good = QuestionResponse::new(&question, true);
/// assert!(validate_answers(&[good.clone()], &[question.clone()]).is_empty());
///
/// let mut wrong = good;
/// wrong.question_id = 99;
/// assert_eq!(
///     validate_answers(&[wrong], &[question]),
///     vec![ValidationError::UnknownQuestion(99)]
/// );
/// ```
pub fn validate_answers(answers: &[QuestionResponse], questions: &[Question]) -> Vec<ValidationError> {
    let by_id: HashMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for answer in answers {
        if !seen.insert(answer.question_id) {
            errors.push(ValidationError::DuplicateAnswer(answer.question_id));
            continue;
        }
        match by_id.get(&answer.question_id) {
            None => errors.push(ValidationError::UnknownQuestion(answer.question_id)),
            Some(question) if question.category != answer.category => {
                errors.push(ValidationError::CategoryMismatch {
                    question_id: answer.question_id,
                    expected: question.category.clone(),
                    found: answer.category.clone(),
                });
            }
            Some(_) => {}
        }
    }

    errors
}
