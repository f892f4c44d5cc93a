//! PostgreSQL Index Store Implementation
//!
//! Production backend for the run index, enabled with the `postgres` feature.
//! Identifiers use the native `UUID` type; references are plain `TEXT`.
//!
//! Like the SQLite store this uses runtime queries (`sqlx::query`) rather than
//! the compile-time macros, so the crate builds without a `DATABASE_URL`.
//!
//! ## Connection Pooling
//!
//! Uses `sqlx::PgPool` with 20 connections by default, configurable via
//! [`PostgresIndexStore::with_pool_options`].
//!
//! ## Migrations
//!
//! Run automatically on startup via `sqlx::migrate!("./migrations-postgres")`.

use crate::{
    error::{MetadataError, Result},
    now_ms,
    types::IndexRow,
    IndexStore, MAX_ROWS_PER_INSERT,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

/// PostgreSQL-based run index
pub struct PostgresIndexStore {
    pool: PgPool,
}

impl PostgresIndexStore {
    /// Connect with default pool options (20 connections).
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_pool_options(database_url, 20).await
    }

    /// Connect with an explicit maximum pool size.
    pub async fn with_pool_options(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations-postgres").run(&pool).await?;

        tracing::info!(max_connections, "Connected to PostgreSQL run index");

        Ok(Self { pool })
    }

    fn row_to_index_row(row: &PgRow) -> Result<IndexRow> {
        Ok(IndexRow {
            id: row.try_get("id")?,
            trace_id: row.try_get("trace_id")?,
            name: row.try_get("name")?,
            inputs_ref: row.try_get("inputs")?,
            outputs_ref: row.try_get("outputs")?,
            metadata_ref: row.try_get("metadata")?,
        })
    }
}

#[async_trait]
impl IndexStore for PostgresIndexStore {
    async fn insert_rows(&self, rows: &[IndexRow]) -> Result<Vec<Uuid>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let created_at = now_ms();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(rows.len());

        for chunk in rows.chunks(MAX_ROWS_PER_INSERT) {
            let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO runs (id, trace_id, name, inputs, outputs, metadata, created_at) ",
            );
            query.push_values(chunk, |mut b, row| {
                b.push_bind(row.id)
                    .push_bind(row.trace_id)
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
                ids.push(row.try_get::<Uuid, _>("id")?);
            }
        }

        tx.commit().await?;

        Ok(ids)
    }

    async fn get_row(&self, id: Uuid) -> Result<Option<IndexRow>> {
        let row = sqlx::query(
            "SELECT id, trace_id, name,
                    COALESCE(inputs, '') AS inputs,
                    COALESCE(outputs, '') AS outputs,
                    COALESCE(metadata, '') AS metadata
             FROM runs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_index_row).transpose()
    }
}
