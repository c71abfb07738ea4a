//! Configuration and questionnaire content for riskcheck.
//!
//! This crate owns the two YAML documents the application reads:
//!
//! - [`AppConfig`]: database location, scan timeouts, enabled checks, probe
//!   command overrides and the default log filter.
//! - [`QuestionCatalog`]: the self-assessment questionnaire, either loaded
//!   from a file or the bundled default.
//!
//! # Quick start
//!
//! ```no_run
//! use riskcheck_catalog::{AppConfig, QuestionCatalog};
//!
//! let config = AppConfig::load_or_default("riskcheck.yml").unwrap();
//! config.validate().unwrap();
//!
//! let catalog = QuestionCatalog::bundled().unwrap();
//! println!("{} questions in {} categories", catalog.len(), catalog.categories().len());
//! ```

mod config;
mod error;
mod questions;

pub use config::{
    AppConfig, DatabaseConfig, LoggingConfig, MAX_GLOBAL_TIMEOUT_SECS, MAX_PROBE_TIMEOUT_SECS,
    ProbeOverride, ScanSettings,
};
pub use error::{CatalogError, Result};
pub use questions::{CatalogCategory, CatalogQuestion, QuestionCatalog};
