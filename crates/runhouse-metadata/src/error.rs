//! Metadata Error Types
//!
//! ## Error Categories
//!
//! - `DuplicateId`: an inserted run id already exists in the index
//! - `DatabaseError`: SQLite/PostgreSQL operation failed (connection, query, etc.)
//! - `InvalidRow`: a stored row could not be decoded (e.g. a non-UUID id column)
//! - `MigrationError`: schema migration failed on startup
//!
//! A missing run is not an error: `get_row` returns `Ok(None)`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Run already exists: {0}")]
    DuplicateId(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl MetadataError {
    /// Classify an insert failure, surfacing primary-key conflicts as `DuplicateId`.
    pub(crate) fn from_insert(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                MetadataError::DuplicateId(db.message().to_string())
            }
            _ => MetadataError::DatabaseError(e),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for MetadataError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        MetadataError::MigrationError(e.to_string())
    }
}
