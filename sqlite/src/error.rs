//! Error types for SQLite storage operations.
//!
//! Provides a unified error type covering database access, row conversion,
//! migration and input validation failures.

use thiserror::Error;

/// Errors that can occur while reading or writing the assessment database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A stored row could not be turned back into a domain value.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// JSON column encoding or decoding failure.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Migration lifecycle operation failure.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Input rejected before it reached the database.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl StorageError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience alias for results with [`StorageError`].
pub type Result<T> = std::result::Result<T, StorageError>;
