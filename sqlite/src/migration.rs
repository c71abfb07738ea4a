//! Migration lifecycle operations for the assessment database.
//!
//! Provides [`Migration`] for creating and dropping the table structure and
//! reporting row counts. All mutation operations use transactions to ensure
//! atomicity.
//!
//! # Example
//!
//! ```no_run
//! use riskcheck_sqlite::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("riskcheck.db").unwrap();
//! let mut migration = Migration::new(conn).unwrap();
//!
//! migration.up().unwrap();
//! let status = migration.status().unwrap();
//! assert!(status.tables_exist);
//!
//! let conn = migration.into_connection();
//! ```

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::schema::{DROP_SQL, SCHEMA_SQL, TABLES};

/// Manages the lifecycle of the assessment tables.
///
/// All mutation operations run inside a transaction: either every statement
/// succeeds or none are applied.
pub struct Migration {
    conn: Connection,
}

impl Migration {
    /// Wraps a connection and turns on foreign key enforcement.
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Creates all tables and indexes.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS` so it is safe to call multiple times.
    pub fn up(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(SCHEMA_SQL)
            .map_err(|e| StorageError::MigrationError(format!("failed to create tables: {e}")))?;
        tx.commit()?;
        debug!(tables = TABLES.len(), "schema up to date");
        Ok(())
    }

    /// Drops all tables in reverse dependency order.
    pub fn down(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(DROP_SQL)
            .map_err(|e| StorageError::MigrationError(format!("failed to drop tables: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    /// Returns whether the tables exist and how many rows each holds.
    pub fn status(&self) -> Result<MigrationStatus> {
        let missing = missing_tables(&self.conn)?;
        if !missing.is_empty() {
            return Ok(MigrationStatus {
                tables_exist: false,
                missing_tables: missing,
                ..MigrationStatus::default()
            });
        }

        Ok(MigrationStatus {
            tables_exist: true,
            missing_tables: Vec::new(),
            company_count: self.count_rows("companies")?,
            question_count: self.count_rows("questions")?,
            assessment_count: self.count_rows("assessments")?,
            response_count: self.count_rows("responses")?,
            scan_count: self.count_rows("scans")?,
            scan_result_count: self.count_rows("scan_results")?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migration and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Names of expected tables absent from the database.
pub(crate) fn missing_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    let mut missing = Vec::new();
    for table in TABLES {
        let count: i64 = stmt.query_row([table], |row| row.get(0))?;
        if count == 0 {
            missing.push(table.to_string());
        }
    }
    Ok(missing)
}

/// Snapshot of the migration state, returned by [`Migration::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Whether every table exists.
    pub tables_exist: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_tables: Vec<String>,
    pub company_count: usize,
    pub question_count: usize,
    pub assessment_count: usize,
    pub response_count: usize,
    pub scan_count: usize,
    pub scan_result_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration() -> Migration {
        Migration::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_status_on_empty_database() {
        let status = migration().status().unwrap();
        assert!(!status.tables_exist);
        assert_eq!(status.missing_tables.len(), TABLES.len());
        assert_eq!(status.scan_count, 0);
    }

    #[test]
    fn test_up_and_status() {
        let mut migration = migration();
        migration.up().unwrap();
        let status = migration.status().unwrap();
        assert!(status.tables_exist);
        assert!(status.missing_tables.is_empty());
        assert_eq!(status.company_count, 0);
        assert_eq!(status.scan_result_count, 0);
    }

    #[test]
    fn test_up_is_idempotent() {
        let mut migration = migration();
        migration.up().unwrap();
        migration.up().unwrap();
        assert!(migration.status().unwrap().tables_exist);
    }

    #[test]
    fn test_down_removes_tables() {
        let mut migration = migration();
        migration.up().unwrap();
        migration.down().unwrap();
        assert!(!migration.status().unwrap().tables_exist);
        migration.down().unwrap();
    }

    #[test]
    fn test_partially_created_schema_reports_missing() {
        let mut migration = migration();
        migration.up().unwrap();
        migration
            .connection()
            .execute_batch("DROP TABLE scan_results;")
            .unwrap();
        let status = migration.status().unwrap();
        assert!(!status.tables_exist);
        assert_eq!(status.missing_tables, vec!["scan_results".to_string()]);
    }
}
