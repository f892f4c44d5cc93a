//! RunHouse Storage Layer
//!
//! This crate moves run payloads in and out of object storage. Runs are never
//! stored one object per run: each submitted batch becomes a single JSON blob,
//! and the run index records a byte range into that blob for every payload
//! field.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐
//! │  POST /runs │
//! └──────┬──────┘
//!        │ runs
//!        ▼
//! ┌─────────────────┐
//! │ BatchWriter     │ ◄── You are here
//! │ - Encodes       │
//! │ - Uploads       │──────────────┐
//! │ - Indexes       │              │ rows
//! └────────┬────────┘              ▼
//!          │ blob         ┌─────────────────┐
//!          ▼              │   Run Index     │
//! ┌─────────────────┐     │(SQLite/Postgres)│
//! │      S3         │     └────────┬────────┘
//! │  (MinIO/AWS)    │              │ row
//! └────────┬────────┘              │
//!          │ byte ranges           │
//!          ▼                       │
//! ┌─────────────────┐              │
//! │ RunReader       │ ◄────────────┘
//! │ - Range reads   │ ◄── You are here
//! │ - Assembles     │
//! │ - Streams       │
//! └────────┬────────┘
//!          │ JSON
//!          ▼
//! ┌───────────────┐
//! │ GET /runs/:id │
//! └───────────────┘
//! ```
//!
//! ## Main Components
//!
//! - [`BatchEncoder`]: serializes a batch and measures each field's byte span
//!   during the same pass
//! - [`BatchWriter`]: uploads the blob and inserts the index rows concurrently
//! - [`RunReader`]: range-reads the three fields concurrently and streams the
//!   run back, substituting `{}` for any field that cannot be read
//! - [`BufferPool`]: optional reuse of blob buffers across requests
//!
//! ## Usage Example
//!
//! ```ignore
//! use runhouse_storage::{BatchWriter, RunReader, StorageConfig};
//!
//! let writer = BatchWriter::new(object_store.clone(), index.clone(), StorageConfig::default());
//! let ids = writer.write_runs(&runs, body_len).await?;
//!
//! let reader = RunReader::new(object_store, index, StorageConfig::default());
//! let run = reader.read_run_value(ids[0]).await?;
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod pool;
pub mod reader;
pub mod writer;

pub use batch::{batch_key, BatchEncoder, EncodedBatch, EncodedRun};
pub use config::StorageConfig;
pub use error::{Error, Result, WriteFailure};
pub use pool::BufferPool;
pub use reader::{RunReader, RunStream};
pub use writer::BatchWriter;
