//! Conversion between domain values and SQLite column values.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC so that
//! lexical order in SQL matches chronological order. Enumerations are
//! stored by their snake_case name. Structured values (normalized results,
//! raw outcomes, risk scores) are stored as JSON text.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use riskcheck_core::{Company, Question};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, StorageError};

pub(crate) fn timestamp_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn timestamp_from_sql(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::ConversionError(format!("invalid timestamp '{value}': {e}")))
}

/// Parses a stored enumeration name.
pub(crate) fn enum_from_sql<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StorageError::ConversionError(e.to_string()))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn from_json<T: DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(value)?)
}

pub(crate) type CompanyRow = (i64, String, Option<String>, Option<String>, String);

pub(crate) const COMPANY_COLUMNS: &str = "id, name, industry, size, created_at";

pub(crate) fn company_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CompanyRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

pub(crate) fn company_from_row(row: CompanyRow) -> Result<Company> {
    let (id, name, industry, size, created_at) = row;
    Ok(Company {
        id,
        name,
        industry,
        size,
        created_at: timestamp_from_sql(&created_at)?,
    })
}

pub(crate) const QUESTION_COLUMNS: &str = "id, category, subcategory, question, action, how_to, why";

pub(crate) fn question_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Question> {
    Ok(Question {
        id: row.get(0)?,
        category: row.get(1)?,
        subcategory: row.get(2)?,
        question: row.get(3)?,
        action: row.get(4)?,
        how_to: row.get(5)?,
        why: row.get(6)?,
    })
}
