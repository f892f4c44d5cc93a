//! RunHouse Metadata Store
//!
//! This crate implements the run index - the relational side of the engine that
//! knows which blob bytes belong to which run.
//!
//! ## Purpose
//!
//! Run payloads (`inputs`, `outputs`, `metadata`) live in batch blobs in object
//! storage. The index stores, for every run:
//! - **Identity**: `id`, `trace_id`, `name`
//! - **References**: one byte-range reference per payload field
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  POST /runs  │
//! └──────┬───────┘
//!        │ one blob + N rows
//!        ▼
//! ┌──────────────┐     ┌─────────────────┐
//! │      S3      │ ←──→│   Run Index     │ ◄── You are here
//! │   (Blobs)    │     │(SQLite/Postgres)│
//! └──────────────┘     └────────┬────────┘
//!                               │ get_row
//!                      ┌────────┴─────────┐
//!                      │  GET /runs/:id   │
//!                      └──────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```ignore
//! use runhouse_metadata::{IndexStore, SqliteIndexStore};
//!
//! let store = SqliteIndexStore::new("runs.db").await?;
//! let ids = store.insert_rows(&rows).await?;
//! let row = store.get_row(ids[0]).await?.expect("just inserted");
//! ```
//!
//! ## Thread Safety
//! - SQLx connection pool handles concurrent access
//! - Bulk inserts run in a single transaction
//! - Safe to share across async tasks via `Arc<dyn IndexStore>`

pub mod error;
pub mod store;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::{MetadataError, Result};
pub use store::SqliteIndexStore;
pub use types::IndexRow;

#[cfg(feature = "postgres")]
pub use postgres::PostgresIndexStore;

use async_trait::async_trait;
use uuid::Uuid;

/// Upper bound on rows per multi-row `INSERT`, keeping bind parameters under
/// the SQLite and PostgreSQL limits.
pub const MAX_ROWS_PER_INSERT: usize = 1000;

/// Run index trait - abstracts over relational backends.
///
/// ## Implementations
///
/// - **SqliteIndexStore**: embedded, also used in-memory for tests
/// - **PostgresIndexStore**: shared index for multi-node deployments (`postgres` feature)
///
/// All implementations must be Send + Sync, allowing safe sharing across async
/// tasks via `Arc<dyn IndexStore>`.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Insert one row per run in a single transaction.
    ///
    /// Returns the identifiers reported by the database. Callers must not rely
    /// on their order matching `rows`.
    ///
    /// # Errors
    ///
    /// - `DuplicateId`: a row with the same `id` already exists; nothing is inserted
    /// - `DatabaseError`: database operation failed
    async fn insert_rows(&self, rows: &[IndexRow]) -> Result<Vec<Uuid>>;

    /// Fetch the row for `id`, or `None` if no such run exists.
    async fn get_row(&self, id: Uuid) -> Result<Option<IndexRow>>;
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
