//! Transactional persistence of scan reports.
//!
//! A report is written as one `scan_results` row per check plus one `scans`
//! summary row, inside a single transaction. The summary row is written last,
//! so a reader that finds a `scans` row always finds every check row with it.
//! Writes are upserts keyed on `scan_id` (and `check_type`), so persisting the
//! same report twice leaves the same rows.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use chrono::Utc;
//! use riskcheck_core::ScanReport;
//! use riskcheck_sqlite::{Migration, ScanResultStore};
//! use rusqlite::Connection;
//!
//! let mut migration = Migration::new(Connection::open("riskcheck.db").unwrap()).unwrap();
//! migration.up().unwrap();
//! let conn = migration.into_connection();
//!
//! let now = Utc::now();
//! let report = ScanReport::new("scan-1", now, now, BTreeMap::new());
//! let store = ScanResultStore::new(&conn);
//! store.persist(7, &report).unwrap();
//! assert!(store.latest_scan_for_assessment(7).unwrap().is_some());
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use riskcheck_core::{
    CheckStatus, CheckType, NormalizedResult, OverallStatus, RawOutcome, ScanReport,
};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;
use tracing::{info, warn};

use crate::convert::{enum_from_sql, from_json, timestamp_from_sql, timestamp_to_sql, to_json};
use crate::error::{Result, StorageError};

/// One stored `scan_results` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCheckRow {
    pub id: i64,
    pub scan_id: String,
    pub assessment_id: Option<i64>,
    pub check_type: CheckType,
    pub status: CheckStatus,
    pub result: NormalizedResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawOutcome>,
    pub timestamp: DateTime<Utc>,
}

type CheckRow = (i64, String, Option<i64>, String, String, String, Option<String>, String);

const CHECK_ROW_COLUMNS: &str =
    "id, scan_id, assessment_id, check_type, status, data, raw_data, timestamp";

type SummaryRow = (String, String, String, i64);

/// Reads and writes scan reports over a borrowed connection.
pub struct ScanResultStore<'a> {
    conn: &'a Connection,
}

impl<'a> ScanResultStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Persists a report for an assessment, all rows or none.
    ///
    /// The assessment row does not need to exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if any write fails; the transaction is then
    /// rolled back and no row of this report is visible.
    pub fn persist(&self, assessment_id: i64, report: &ScanReport) -> Result<()> {
        self.persist_with_raw(assessment_id, report, &BTreeMap::new())
    }

    /// Like [`persist`](Self::persist), also storing each check's raw probe
    /// outcome next to its normalized result.
    pub fn persist_with_raw(
        &self,
        assessment_id: i64,
        report: &ScanReport,
        raw: &BTreeMap<CheckType, RawOutcome>,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        match write_report(&tx, assessment_id, report, raw) {
            Ok(()) => {
                tx.commit()?;
                info!(
                    scan_id = report.scan_id(),
                    assessment_id,
                    checks = report.len(),
                    overall = %report.overall_status(),
                    "scan report persisted"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    scan_id = report.scan_id(),
                    assessment_id,
                    error = %e,
                    "scan report rolled back"
                );
                Err(e)
            }
        }
    }

    /// Loads a stored report by scan id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConversionError`] if the check rows do not
    /// match the summary row.
    pub fn load_scan(&self, scan_id: &str) -> Result<Option<ScanReport>> {
        let summary: Option<SummaryRow> = self
            .conn
            .query_row(
                "SELECT started_at, finished_at, overall_status, check_count \
                 FROM scans WHERE scan_id = ?1",
                params![scan_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((started_at, finished_at, overall_status, check_count)) = summary else {
            return Ok(None);
        };

        let mut per_check = BTreeMap::new();
        for row in self.check_rows(scan_id)? {
            per_check.insert(row.check_type, row.result);
        }
        if per_check.len() as i64 != check_count {
            return Err(StorageError::ConversionError(format!(
                "scan {scan_id} has {} check rows, summary expects {check_count}",
                per_check.len()
            )));
        }

        let report = ScanReport::new(
            scan_id,
            timestamp_from_sql(&started_at)?,
            timestamp_from_sql(&finished_at)?,
            per_check,
        );
        let stored_status: OverallStatus = enum_from_sql(&overall_status)?;
        if report.overall_status() != stored_status {
            return Err(StorageError::ConversionError(format!(
                "scan {scan_id} stored as {stored_status} but its checks derive {}",
                report.overall_status()
            )));
        }
        Ok(Some(report))
    }

    /// The most recently finished scan, for any assessment.
    pub fn latest_scan(&self) -> Result<Option<ScanReport>> {
        let scan_id: Option<String> = self
            .conn
            .query_row(
                "SELECT scan_id FROM scans ORDER BY finished_at DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match scan_id {
            Some(id) => self.load_scan(&id),
            None => Ok(None),
        }
    }

    /// The most recently finished scan stored for one assessment.
    pub fn latest_scan_for_assessment(&self, assessment_id: i64) -> Result<Option<ScanReport>> {
        let scan_id: Option<String> = self
            .conn
            .query_row(
                "SELECT scan_id FROM scans WHERE assessment_id = ?1 \
                 ORDER BY finished_at DESC, rowid DESC LIMIT 1",
                params![assessment_id],
                |row| row.get(0),
            )
            .optional()?;
        match scan_id {
            Some(id) => self.load_scan(&id),
            None => Ok(None),
        }
    }

    /// Stored check rows of one scan, ordered by check type.
    pub fn check_rows(&self, scan_id: &str) -> Result<Vec<StoredCheckRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHECK_ROW_COLUMNS} FROM scan_results WHERE scan_id = ?1 ORDER BY id"
        ))?;
        let raw_rows: Vec<CheckRow> = stmt
            .query_map(params![scan_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut rows = raw_rows
            .into_iter()
            .map(check_row_from_sql)
            .collect::<Result<Vec<_>>>()?;
        rows.sort_by_key(|row| row.check_type);
        Ok(rows)
    }
}

fn write_report(
    tx: &Transaction<'_>,
    assessment_id: i64,
    report: &ScanReport,
    raw: &BTreeMap<CheckType, RawOutcome>,
) -> Result<()> {
    let mut insert_check = tx.prepare(
        "INSERT INTO scan_results \
         (scan_id, assessment_id, check_type, status, data, raw_data, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT (scan_id, check_type) DO UPDATE SET \
         assessment_id = excluded.assessment_id, status = excluded.status, \
         data = excluded.data, raw_data = excluded.raw_data, timestamp = excluded.timestamp",
    )?;
    for (check_type, result) in report.per_check() {
        let raw_data = raw.get(check_type).map(to_json).transpose()?;
        insert_check.execute(params![
            report.scan_id(),
            assessment_id,
            check_type.as_str(),
            result.status.as_str(),
            to_json(result)?,
            raw_data,
            timestamp_to_sql(&result.timestamp),
        ])?;
    }

    tx.execute(
        "INSERT INTO scans \
         (scan_id, assessment_id, started_at, finished_at, overall_status, check_count, report) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT (scan_id) DO UPDATE SET \
         assessment_id = excluded.assessment_id, started_at = excluded.started_at, \
         finished_at = excluded.finished_at, overall_status = excluded.overall_status, \
         check_count = excluded.check_count, report = excluded.report",
        params![
            report.scan_id(),
            assessment_id,
            timestamp_to_sql(&report.started_at()),
            timestamp_to_sql(&report.finished_at()),
            report.overall_status().as_str(),
            report.len() as i64,
            to_json(report)?,
        ],
    )?;
    Ok(())
}

fn check_row_from_sql(row: CheckRow) -> Result<StoredCheckRow> {
    let (id, scan_id, assessment_id, check_type, status, data, raw_data, timestamp) = row;
    let result: NormalizedResult = from_json(&data)?;
    let check_type: CheckType = enum_from_sql(&check_type)?;
    if result.check_type != check_type {
        return Err(StorageError::ConversionError(format!(
            "scan_results row {id} is filed under {check_type} but holds a {} result",
            result.check_type
        )));
    }
    Ok(StoredCheckRow {
        id,
        scan_id,
        assessment_id,
        check_type,
        status: enum_from_sql(&status)?,
        result,
        raw: raw_data.as_deref().map(from_json).transpose()?,
        timestamp: timestamp_from_sql(&timestamp)?,
    })
}
