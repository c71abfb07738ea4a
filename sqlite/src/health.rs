//! Database diagnostics.

use rusqlite::Connection;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::migration::missing_tables;

/// Result of [`check_health`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseHealth {
    pub missing_tables: Vec<String>,
    pub writable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_error: Option<String>,
}

impl DatabaseHealth {
    pub fn is_healthy(&self) -> bool {
        self.missing_tables.is_empty() && self.writable
    }
}

/// Checks that every table exists and that the database accepts writes.
///
/// The write probe creates a scratch table inside a transaction that is
/// always rolled back, so the database is left unchanged.
///
/// # Errors
///
/// Returns an error only if the catalog of tables cannot be read. A failed
/// write probe is reported through [`DatabaseHealth::writable`].
pub fn check_health(conn: &Connection) -> Result<DatabaseHealth> {
    let missing_tables = missing_tables(conn)?;

    let write_error = match write_probe(conn) {
        Ok(()) => None,
        Err(e) => {
            warn!(error = %e, "database write probe failed");
            Some(e.to_string())
        }
    };

    Ok(DatabaseHealth {
        missing_tables,
        writable: write_error.is_none(),
        write_error,
    })
}

fn write_probe(conn: &Connection) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE riskcheck_write_probe (id INTEGER PRIMARY KEY); \
         INSERT INTO riskcheck_write_probe (id) VALUES (1);",
    )?;
    tx.rollback()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Migration;

    #[test]
    fn test_fresh_database_reports_missing_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let health = check_health(&conn).unwrap();
        assert!(!health.is_healthy());
        assert!(health.writable);
        assert_eq!(health.missing_tables.len(), crate::TABLES.len());
    }

    #[test]
    fn test_migrated_database_is_healthy_and_unchanged() {
        let mut migration = Migration::new(Connection::open_in_memory().unwrap()).unwrap();
        migration.up().unwrap();
        let conn = migration.into_connection();

        let health = check_health(&conn).unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.write_error, None);

        let probe_tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'riskcheck_write_probe'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(probe_tables, 0);
    }

    #[test]
    fn test_read_only_database_is_not_writable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("riskcheck.db");
        {
            let mut migration = Migration::new(Connection::open(&path).unwrap()).unwrap();
            migration.up().unwrap();
        }

        let conn = Connection::open_with_flags(
            &path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .unwrap();
        let health = check_health(&conn).unwrap();
        assert!(health.missing_tables.is_empty());
        assert!(!health.writable);
        assert!(health.write_error.is_some());
        assert!(!health.is_healthy());
    }
}
