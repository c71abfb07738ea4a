//! SQLite storage for riskcheck.
//!
//! This crate persists companies, questionnaire answers, assessments and
//! system scan reports in a single local database. It includes migration
//! lifecycle management, the transactional scan result store and a database
//! health check.
//!
//! # Architecture
//!
//! - **`schema`**: table and index definitions
//! - **`migration`**: lifecycle operations (up/down/status)
//! - **`convert`**: timestamp, enum and JSON column conversions
//! - **`scan_store`**: all-or-nothing persistence of scan reports
//! - **`assessment_store`**: companies, questions, answers and results
//! - **`health`**: table presence and write probe
//!
//! The stores borrow a [`rusqlite::Connection`]; the caller opens it once
//! and runs [`Migration::up`] before handing it out.
//!
//! # Quick start
//!
//! ```no_run
//! use riskcheck_core::NewCompany;
//! use riskcheck_sqlite::{AssessmentStore, Migration};
//! use rusqlite::Connection;
//!
//! let mut migration = Migration::new(Connection::open("riskcheck.db").unwrap()).unwrap();
//! migration.up().unwrap();
//! let conn = migration.into_connection();
//!
//! let store = AssessmentStore::new(&conn);
//! let company = store
//!     .create_company(&NewCompany { name: "Acme".into(), ..NewCompany::default() })
//!     .unwrap();
//! let assessment = store.create_assessment(company.id).unwrap();
//! println!("assessment {} started", assessment.id());
//! ```

mod assessment_store;
mod convert;
mod error;
mod health;
mod migration;
mod scan_store;
mod schema;

pub use assessment_store::{AssessmentResults, AssessmentStore, SeedReport};
pub use error::{Result, StorageError};
pub use health::{DatabaseHealth, check_health};
pub use migration::{Migration, MigrationStatus};
pub use scan_store::{ScanResultStore, StoredCheckRow};
pub use schema::TABLES;
