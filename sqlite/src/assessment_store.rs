//! Companies, questions, assessments and answers.
//!
//! [`AssessmentStore`] is the CRUD side of the database. Scan reports are
//! written by [`ScanResultStore`](crate::ScanResultStore); this store only
//! reads them back when assembling assessment results.

use chrono::Utc;
use riskcheck_core::{
    Assessment, Company, NewCompany, NewQuestion, Question, QuestionResponse, Recommendation,
    RiskScore, ScanReport, compute_risk, recommendations, validate_answers, validate_new_company,
};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::convert::{
    COMPANY_COLUMNS, QUESTION_COLUMNS, company_from_row, company_row, question_from_row,
    timestamp_from_sql, timestamp_to_sql, to_json,
};
use crate::error::{Result, StorageError};
use crate::scan_store::ScanResultStore;

/// Everything shown once an assessment is finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentResults {
    pub company: Company,
    pub assessment: Assessment,
    pub risk: RiskScore,
    pub recommendations: Vec<Recommendation>,
}

impl AssessmentResults {
    pub fn latest_scan(&self) -> Option<&ScanReport> {
        self.assessment.scan_report()
    }
}

/// Outcome of [`AssessmentStore::seed_questions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    /// Questions already present under the same category and text.
    pub existing: usize,
}

type ResponseRow = (i64, String, Option<String>, bool, Option<String>, String);

/// CRUD access to the questionnaire tables over a borrowed connection.
pub struct AssessmentStore<'a> {
    conn: &'a Connection,
}

impl<'a> AssessmentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Validates and inserts a company.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidInput`] if the name is blank or too long.
    pub fn create_company(&self, company: &NewCompany) -> Result<Company> {
        let errors = validate_new_company(company);
        if !errors.is_empty() {
            return Err(invalid_input(&errors));
        }

        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO companies (name, industry, size, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                company.name.trim(),
                company.industry,
                company.size,
                timestamp_to_sql(&created_at)
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(company_id = id, name = company.name.trim(), "company created");
        Ok(Company {
            id,
            name: company.name.trim().to_string(),
            industry: company.industry.clone(),
            size: company.size.clone(),
            created_at,
        })
    }

    /// All companies, ordered by name.
    pub fn companies(&self) -> Result<Vec<Company>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY name COLLATE NOCASE, id"
        ))?;
        let rows = stmt
            .query_map([], company_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(company_from_row).collect()
    }

    pub fn company(&self, id: i64) -> Result<Option<Company>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1"),
                params![id],
                company_row,
            )
            .optional()?;
        row.map(company_from_row).transpose()
    }

    /// Inserts questions not yet stored under the same category and text.
    ///
    /// Running it again with the same catalog inserts nothing.
    pub fn seed_questions(&self, questions: &[NewQuestion]) -> Result<SeedReport> {
        let tx = self.conn.unchecked_transaction()?;
        let mut report = SeedReport::default();
        {
            let mut insert = tx.prepare(
                "INSERT INTO questions (category, subcategory, question, action, how_to, why) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT (category, question) DO NOTHING",
            )?;
            for q in questions {
                let changed = insert.execute(params![
                    q.category,
                    q.subcategory,
                    q.question,
                    q.action,
                    q.how_to,
                    q.why
                ])?;
                if changed == 0 {
                    report.existing += 1;
                } else {
                    report.inserted += 1;
                }
            }
        }
        tx.commit()?;
        info!(
            inserted = report.inserted,
            existing = report.existing,
            "questions seeded"
        );
        Ok(report)
    }

    /// All questions in catalog order.
    pub fn questions(&self) -> Result<Vec<Question>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {QUESTION_COLUMNS} FROM questions ORDER BY id"))?;
        let questions = stmt
            .query_map([], question_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(questions)
    }

    pub fn question(&self, id: i64) -> Result<Option<Question>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1"),
                params![id],
                question_from_row,
            )
            .optional()?)
    }

    /// Starts an assessment for an existing company.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the company does not exist.
    pub fn create_assessment(&self, company_id: i64) -> Result<Assessment> {
        if self.company(company_id)?.is_none() {
            return Err(StorageError::not_found("company", company_id));
        }
        let started_at = Utc::now();
        self.conn.execute(
            "INSERT INTO assessments (company_id, assessment_date) VALUES (?1, ?2)",
            params![company_id, timestamp_to_sql(&started_at)],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(assessment_id = id, company_id, "assessment started");
        Ok(Assessment::new(id, company_id, started_at))
    }

    /// Loads an assessment with its answers and its latest stored scan.
    pub fn assessment(&self, id: i64) -> Result<Option<Assessment>> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT company_id, assessment_date FROM assessments WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((company_id, assessment_date)) = row else {
            return Ok(None);
        };

        let mut assessment = Assessment::new(id, company_id, timestamp_from_sql(&assessment_date)?);
        for response in self.responses(id)? {
            assessment.record_answer(response);
        }
        if let Some(report) = ScanResultStore::new(self.conn).latest_scan_for_assessment(id)? {
            assessment
                .attach_scan_report(report)
                .map_err(|e| StorageError::ConversionError(e.to_string()))?;
        }
        Ok(Some(assessment))
    }

    /// Answers of one assessment, in the order they were first given.
    pub fn responses(&self, assessment_id: i64) -> Result<Vec<QuestionResponse>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.question_id, q.category, q.subcategory, r.response, r.notes, r.timestamp \
             FROM responses r JOIN questions q ON q.id = r.question_id \
             WHERE r.assessment_id = ?1 ORDER BY r.id",
        )?;
        let rows: Vec<ResponseRow> = stmt
            .query_map(params![assessment_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(question_id, category, subcategory, answer, notes, timestamp)| {
                Ok(QuestionResponse {
                    question_id,
                    category,
                    subcategory,
                    answer,
                    notes,
                    timestamp: timestamp_from_sql(&timestamp)?,
                })
            })
            .collect()
    }

    /// Stores one answer, replacing an earlier answer to the same question.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] for an unknown assessment and
    /// [`StorageError::InvalidInput`] for an unknown question or an answer
    /// filed under the wrong category.
    pub fn save_response(&self, assessment_id: i64, response: &QuestionResponse) -> Result<()> {
        if !self.assessment_exists(assessment_id)? {
            return Err(StorageError::not_found("assessment", assessment_id));
        }
        let questions: Vec<Question> = self.question(response.question_id)?.into_iter().collect();
        let errors = validate_answers(std::slice::from_ref(response), &questions);
        if !errors.is_empty() {
            return Err(invalid_input(&errors));
        }

        upsert_response(self.conn, assessment_id, response)?;
        debug!(
            assessment_id,
            question_id = response.question_id,
            answer = response.answer,
            "response saved"
        );
        Ok(())
    }

    /// Writes all answers and the derived risk score in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the assessment row does not
    /// exist and [`StorageError::InvalidInput`] if any answer fails
    /// validation. Nothing is written in either case.
    pub fn save_assessment(&self, assessment: &Assessment) -> Result<RiskScore> {
        if !self.assessment_exists(assessment.id())? {
            return Err(StorageError::not_found("assessment", assessment.id()));
        }
        let errors = validate_answers(assessment.answers(), &self.questions()?);
        if !errors.is_empty() {
            return Err(invalid_input(&errors));
        }

        let risk = assessment.risk_score();
        let tx = self.conn.unchecked_transaction()?;
        for response in assessment.answers() {
            upsert_response(&tx, assessment.id(), response)?;
        }
        tx.execute(
            "UPDATE assessments SET risk_score = ?1 WHERE id = ?2",
            params![to_json(&risk)?, assessment.id()],
        )?;
        tx.commit()?;
        info!(
            assessment_id = assessment.id(),
            answers = assessment.answers().len(),
            percentage = risk.percentage,
            level = %risk.level,
            "assessment saved"
        );
        Ok(risk)
    }

    /// Assembles the company, answers, latest scan, risk score and
    /// recommendations of one assessment.
    pub fn assessment_results(&self, assessment_id: i64) -> Result<AssessmentResults> {
        let assessment = self
            .assessment(assessment_id)?
            .ok_or_else(|| StorageError::not_found("assessment", assessment_id))?;
        let company = self
            .company(assessment.company_id())?
            .ok_or_else(|| StorageError::not_found("company", assessment.company_id()))?;
        let questions = self.questions()?;

        let risk = compute_risk(assessment.answers(), assessment.scan_report());
        let recommendations =
            recommendations(assessment.answers(), &questions, assessment.scan_report());
        Ok(AssessmentResults {
            company,
            assessment,
            risk,
            recommendations,
        })
    }

    fn assessment_exists(&self, id: i64) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM assessments WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }
}

fn upsert_response(conn: &Connection, assessment_id: i64, response: &QuestionResponse) -> Result<()> {
    conn.execute(
        "INSERT INTO responses (assessment_id, question_id, response, notes, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT (assessment_id, question_id) DO UPDATE SET \
         response = excluded.response, notes = excluded.notes, timestamp = excluded.timestamp",
        params![
            assessment_id,
            response.question_id,
            response.answer,
            response.notes,
            timestamp_to_sql(&response.timestamp)
        ],
    )?;
    Ok(())
}

fn invalid_input<E: ToString>(errors: &[E]) -> StorageError {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    StorageError::InvalidInput(messages.join("; "))
}

#[cfg(test)]
mod tests {
    use riskcheck_core::{RecommendationSource, RiskLevel};

    use super::*;
    use crate::Migration;

    fn connection() -> Connection {
        let mut migration = Migration::new(Connection::open_in_memory().unwrap()).unwrap();
        migration.up().unwrap();
        migration.into_connection()
    }

    fn new_question(category: &str, text: &str) -> NewQuestion {
        NewQuestion {
            category: category.to_string(),
            subcategory: None,
            question: text.to_string(),
            action: Some(format!("Fix: {text}")),
            how_to: None,
            why: None,
        }
    }

    fn acme(store: &AssessmentStore<'_>) -> Company {
        store
            .create_company(&NewCompany {
                name: "  Acme  ".into(),
                industry: Some("Retail".into()),
                size: None,
            })
            .unwrap()
    }

    #[test]
    fn test_create_and_list_companies() {
        let conn = connection();
        let store = AssessmentStore::new(&conn);
        let acme = acme(&store);
        assert_eq!(acme.name, "Acme");
        store
            .create_company(&NewCompany {
                name: "beta".into(),
                ..NewCompany::default()
            })
            .unwrap();

        let names: Vec<_> = store.companies().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Acme", "beta"]);
        assert_eq!(store.company(acme.id).unwrap().unwrap(), acme);
    }

    #[test]
    fn test_blank_company_rejected() {
        let conn = connection();
        let store = AssessmentStore::new(&conn);
        let err = store
            .create_company(&NewCompany {
                name: " ".into(),
                ..NewCompany::default()
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
        assert!(store.companies().unwrap().is_empty());
    }

    #[test]
    fn test_seed_questions_is_idempotent() {
        let conn = connection();
        let store = AssessmentStore::new(&conn);
        let questions = vec![new_question("A", "one?"), new_question("B", "one?")];

        let first = store.seed_questions(&questions).unwrap();
        assert_eq!(first, SeedReport { inserted: 2, existing: 0 });
        let second = store.seed_questions(&questions).unwrap();
        assert_eq!(second, SeedReport { inserted: 0, existing: 2 });
        assert_eq!(store.questions().unwrap().len(), 2);
    }

    #[test]
    fn test_assessment_for_unknown_company() {
        let conn = connection();
        let store = AssessmentStore::new(&conn);
        let err = store.create_assessment(99).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { entity: "company", .. }));
    }

    #[test]
    fn test_save_response_replaces_earlier_answer() {
        let conn = connection();
        let store = AssessmentStore::new(&conn);
        let company = acme(&store);
        store
            .seed_questions(&[new_question("A", "first?"), new_question("A", "second?")])
            .unwrap();
        let questions = store.questions().unwrap();
        let assessment = store.create_assessment(company.id).unwrap();

        store
            .save_response(assessment.id(), &QuestionResponse::new(&questions[0], false))
            .unwrap();
        store
            .save_response(assessment.id(), &QuestionResponse::new(&questions[1], false))
            .unwrap();
        store
            .save_response(
                assessment.id(),
                &QuestionResponse::new(&questions[0], true).with_notes("fixed"),
            )
            .unwrap();

        let responses = store.responses(assessment.id()).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].question_id, questions[0].id);
        assert!(responses[0].answer);
        assert_eq!(responses[0].notes.as_deref(), Some("fixed"));
        assert!(!responses[1].answer);
    }

    #[test]
    fn test_save_response_validates() {
        let conn = connection();
        let store = AssessmentStore::new(&conn);
        let company = acme(&store);
        store.seed_questions(&[new_question("A", "first?")]).unwrap();
        let question = store.questions().unwrap().remove(0);
        let assessment = store.create_assessment(company.id).unwrap();

        let mut unknown = QuestionResponse::new(&question, true);
        unknown.question_id = 500;
        assert!(matches!(
            store.save_response(assessment.id(), &unknown),
            Err(StorageError::InvalidInput(_))
        ));

        let mut moved = QuestionResponse::new(&question, true);
        moved.category = "B".into();
        assert!(matches!(
            store.save_response(assessment.id(), &moved),
            Err(StorageError::InvalidInput(_))
        ));

        assert!(matches!(
            store.save_response(12345, &QuestionResponse::new(&question, true)),
            Err(StorageError::NotFound { entity: "assessment", .. })
        ));
    }

    #[test]
    fn test_save_assessment_stores_risk_and_results() {
        let conn = connection();
        let store = AssessmentStore::new(&conn);
        let company = acme(&store);
        store
            .seed_questions(&[
                new_question("A", "a1?"),
                new_question("A", "a2?"),
                new_question("B", "b1?"),
            ])
            .unwrap();
        let questions = store.questions().unwrap();

        let mut assessment = store.create_assessment(company.id).unwrap();
        assessment.record_answer(QuestionResponse::new(&questions[0], false));
        assessment.record_answer(QuestionResponse::new(&questions[1], true));
        assessment.record_answer(QuestionResponse::new(&questions[2], true));

        let risk = store.save_assessment(&assessment).unwrap();
        assert_eq!(risk.percentage, 50.0);
        assert_eq!(risk.level, RiskLevel::Medium);

        let stored: String = conn
            .query_row(
                "SELECT risk_score FROM assessments WHERE id = ?1",
                params![assessment.id()],
                |row| row.get(0),
            )
            .unwrap();
        let stored: RiskScore = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored, risk);

        let results = store.assessment_results(assessment.id()).unwrap();
        assert_eq!(results.company, company);
        assert_eq!(results.risk, risk);
        assert_eq!(results.assessment.answers().len(), 3);
        assert!(results.latest_scan().is_none());
        assert_eq!(results.recommendations.len(), 1);
        assert_eq!(
            results.recommendations[0].source,
            RecommendationSource::Question {
                question_id: questions[0].id
            }
        );
    }

    #[test]
    fn test_save_assessment_rejects_invalid_answers_without_writing() {
        let conn = connection();
        let store = AssessmentStore::new(&conn);
        let company = acme(&store);
        store.seed_questions(&[new_question("A", "a1?")]).unwrap();
        let question = store.questions().unwrap().remove(0);

        let mut assessment = store.create_assessment(company.id).unwrap();
        assessment.record_answer(QuestionResponse::new(&question, false));
        let mut stray = QuestionResponse::new(&question, false);
        stray.question_id = 77;
        assessment.record_answer(stray);

        assert!(matches!(
            store.save_assessment(&assessment),
            Err(StorageError::InvalidInput(_))
        ));
        assert!(store.responses(assessment.id()).unwrap().is_empty());
    }

    #[test]
    fn test_results_for_unknown_assessment() {
        let conn = connection();
        let store = AssessmentStore::new(&conn);
        assert!(matches!(
            store.assessment_results(8),
            Err(StorageError::NotFound { entity: "assessment", .. })
        ));
        assert!(store.assessment(8).unwrap().is_none());
    }
}
