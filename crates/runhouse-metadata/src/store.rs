//! SQLite Index Store Implementation
//!
//! This module implements the [`IndexStore`] trait using SQLite as the backend.
//!
//! ## Usage
//!
//! ### File-Based
//! ```ignore
//! use runhouse_metadata::{SqliteIndexStore, IndexStore};
//!
//! // Creates runs.db (or opens if exists)
//! let store = SqliteIndexStore::new("runs.db").await?;
//! ```
//!
//! ### In-Memory (Testing)
//! ```ignore
//! let store = SqliteIndexStore::new_in_memory().await?;
//! ```
//!
//! ## Implementation Details
//!
//! ### Identifiers
//! SQLite has no UUID type; `id` and `trace_id` are stored as their hyphenated
//! text form and parsed on the way out.
//!
//! ### Bulk Inserts
//! Rows are written with multi-row `INSERT ... RETURNING id` statements of at
//! most [`MAX_ROWS_PER_INSERT`] rows, all inside one transaction. A duplicate
//! id anywhere in the batch rolls back every row.
//!
//! ### Concurrency
//! File-backed databases use WAL journaling so readers never wait on a
//! concurrent batch insert.
//!
//! ### In-Memory Pools
//! Every SQLite in-memory connection is its own database, so the in-memory pool
//! is pinned to a single connection that never idles out.

use crate::{
    error::{MetadataError, Result},
    now_ms,
    types::IndexRow,
    IndexStore, MAX_ROWS_PER_INSERT,
};
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// SQLite-based run index
pub struct SqliteIndexStore {
    pool: SqlitePool,
}

impl SqliteIndexStore {
    /// Open (or create) a SQLite index at `path`.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_url(&format!("sqlite://{}", path.as_ref().display())).await
    }

    /// Open (or create) a SQLite index from a `sqlite://` URL.
    pub async fn from_url(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create in-memory database (for testing)
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    fn row_to_index_row(row: &SqliteRow) -> Result<IndexRow> {
        let id: String = row.try_get("id")?;
        let trace_id: String = row.try_get("trace_id")?;

        Ok(IndexRow {
            id: parse_uuid("id", &id)?,
            trace_id: parse_uuid("trace_id", &trace_id)?,
            name: row.try_get("name")?,
            inputs_ref: row.try_get("inputs")?,
            outputs_ref: row.try_get("outputs")?,
            metadata_ref: row.try_get("metadata")?,
        })
    }
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| MetadataError::InvalidRow(format!("{} {:?}: {}", column, value, e)))
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn insert_rows(&self, rows: &[IndexRow]) -> Result<Vec<Uuid>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let created_at = now_ms();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(rows.len());

        for chunk in rows.chunks(MAX_ROWS_PER_INSERT) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO runs (id, trace_id, name, inputs, outputs, metadata, created_at) ",
            );
            query.push_values(chunk, |mut b, row| {
                b.push_bind(row.id.to_string())
                    .push_bind(row.trace_id.to_string())
                    .push_bind(row.name.clone())
                    .push_bind(row.inputs_ref.clone())
                    .push_bind(row.outputs_ref.clone())
                    .push_bind(row.metadata_ref.clone())
                    .push_bind(created_at);
            });
            query.push(" RETURNING id");

            let returned = query
                .build()
                .fetch_all(&mut *tx)
                .await
                .map_err(MetadataError::from_insert)?;

            for row in returned {
                let id: String = row.try_get("id")?;
                ids.push(parse_uuid("id", &id)?);
            }
        }

        tx.commit().await?;

        tracing::debug!(rows = rows.len(), "Inserted run index rows");

        Ok(ids)
    }

    async fn get_row(&self, id: Uuid) -> Result<Option<IndexRow>> {
        let row = sqlx::query(
            "SELECT id, trace_id, name,
                    COALESCE(inputs, '') AS inputs,
                    COALESCE(outputs, '') AS outputs,
                    COALESCE(metadata, '') AS metadata
             FROM runs WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_index_row).transpose()
    }
}
