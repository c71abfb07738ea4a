//! SQL schema for the assessment database.
//!
//! # Table structure
//!
//! - `companies`: companies being assessed
//! - `questions`: questionnaire entries, unique per `(category, question)`
//! - `assessments`: one questionnaire run per company, with the last
//!   computed risk score as JSON
//! - `responses`: one answer per `(assessment_id, question_id)`
//! - `scans`: one summary row per scan run
//! - `scan_results`: one row per check per scan, holding the serialized
//!   normalized result and optionally the raw probe outcome
//!
//! `scans.assessment_id` and `scan_results.assessment_id` carry no foreign
//! key: a scan may be stored before its assessment row is committed.

/// Tables created by [`SCHEMA_SQL`], in creation order.
pub const TABLES: [&str; 6] = [
    "companies",
    "questions",
    "assessments",
    "responses",
    "scans",
    "scan_results",
];

pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    industry TEXT,
    size TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    subcategory TEXT,
    question TEXT NOT NULL,
    action TEXT,
    how_to TEXT,
    why TEXT,
    UNIQUE (category, question)
);

CREATE TABLE IF NOT EXISTS assessments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id INTEGER NOT NULL,
    assessment_date TEXT NOT NULL,
    risk_score TEXT,
    FOREIGN KEY (company_id) REFERENCES companies(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    assessment_id INTEGER NOT NULL,
    question_id INTEGER NOT NULL,
    response INTEGER NOT NULL,
    notes TEXT,
    timestamp TEXT NOT NULL,
    UNIQUE (assessment_id, question_id),
    FOREIGN KEY (assessment_id) REFERENCES assessments(id) ON DELETE CASCADE,
    FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS scans (
    scan_id TEXT PRIMARY KEY,
    assessment_id INTEGER,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    overall_status TEXT NOT NULL,
    check_count INTEGER NOT NULL,
    report TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scan_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id TEXT NOT NULL,
    assessment_id INTEGER,
    check_type TEXT NOT NULL,
    status TEXT NOT NULL,
    data TEXT NOT NULL,
    raw_data TEXT,
    timestamp TEXT NOT NULL,
    UNIQUE (scan_id, check_type)
);

CREATE INDEX IF NOT EXISTS idx_assessments_company ON assessments(company_id);
CREATE INDEX IF NOT EXISTS idx_responses_assessment ON responses(assessment_id);
CREATE INDEX IF NOT EXISTS idx_scans_assessment ON scans(assessment_id);
CREATE INDEX IF NOT EXISTS idx_scans_finished ON scans(finished_at);
CREATE INDEX IF NOT EXISTS idx_scan_results_assessment ON scan_results(assessment_id);
"#;

/// Drops all tables in reverse dependency order.
pub(crate) const DROP_SQL: &str = r#"
DROP TABLE IF EXISTS scan_results;
DROP TABLE IF EXISTS scans;
DROP TABLE IF EXISTS responses;
DROP TABLE IF EXISTS assessments;
DROP TABLE IF EXISTS questions;
DROP TABLE IF EXISTS companies;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_creates_every_table() {
        for table in TABLES {
            assert!(
                SCHEMA_SQL.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing {table}"
            );
            assert!(DROP_SQL.contains(&format!("DROP TABLE IF EXISTS {table};")));
        }
    }

    #[test]
    fn test_scan_tables_have_no_assessment_foreign_key() {
        let scan_results = SCHEMA_SQL
            .split("CREATE TABLE IF NOT EXISTS scan_results")
            .nth(1)
            .unwrap();
        let scan_results = scan_results.split(");").next().unwrap();
        assert!(scan_results.contains("UNIQUE (scan_id, check_type)"));
        assert!(!scan_results.contains("FOREIGN KEY"));
    }

    #[test]
    fn test_drop_order_is_reverse_of_creation() {
        let positions: Vec<_> = TABLES
            .iter()
            .map(|t| DROP_SQL.find(&format!("DROP TABLE IF EXISTS {t};")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] > w[1]));
    }
}
