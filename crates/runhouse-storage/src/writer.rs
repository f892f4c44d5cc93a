//! Batch Writer
//!
//! The write coordinator. One call persists one batch:
//!
//! ```text
//! write_runs(runs)
//!     ↓
//! BatchEncoder.encode()        ← validate ids, pack blob, measure spans
//!     ↓
//! ┌───────────────┬────────────────┐
//! │ put(blob)     │ insert_rows()  │  ← concurrent, both run to completion
//! └───────┬───────┴────────┬───────┘
//!         └──── join ──────┘
//!     ↓
//! ids in submission order
//! ```
//!
//! The index rows reference the blob before the upload is confirmed. Their
//! spans come from the encoding pass and describe the blob's own layout, so
//! they do not depend on the upload.
//!
//! ## Partial Failure
//!
//! If the upload succeeds and the insert fails, the blob stays in the bucket
//! with no row pointing at it. Orphaned blobs are logged and left in place.
//! If the insert succeeds and the upload fails, the rows exist but every field
//! reads back as `{}`; the call still reports failure.

use object_store::{path::Path, ObjectStore};
use runhouse_core::RunIn;
use runhouse_metadata::{IndexStore, MetadataError};
use runhouse_observability::metrics::{
    BATCHES_WRITTEN_TOTAL, BLOB_BYTES_WRITTEN_TOTAL, RUNS_WRITTEN_TOTAL, WRITE_LATENCY,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::{
    batch::{BatchEncoder, EncodedBatch},
    config::StorageConfig,
    error::{Error, Result, WriteFailure},
    pool::BufferPool,
};

/// Persists batches of runs to the blob store and the run index.
///
/// Cheap to share: wrap in `Arc` and call from any number of request tasks.
pub struct BatchWriter {
    object_store: Arc<dyn ObjectStore>,
    index: Arc<dyn IndexStore>,
    encoder: BatchEncoder,
    pool: Arc<BufferPool>,
    config: StorageConfig,
}

impl BatchWriter {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        index: Arc<dyn IndexStore>,
        config: StorageConfig,
    ) -> Self {
        let pool = Arc::new(BufferPool::from_config(&config));
        Self::with_pool(object_store, index, pool, config)
    }

    /// Create a writer drawing blob buffers from a shared pool.
    pub fn with_pool(
        object_store: Arc<dyn ObjectStore>,
        index: Arc<dyn IndexStore>,
        pool: Arc<BufferPool>,
        config: StorageConfig,
    ) -> Self {
        Self {
            object_store,
            index,
            encoder: BatchEncoder::new(pool.clone()),
            pool,
            config,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Encode and persist `runs`, returning their ids in submission order.
    ///
    /// # Errors
    ///
    /// - `InvalidBatch`: empty batch or malformed identifier; nothing is written
    /// - `Encoding`: a payload could not be serialized; nothing is written
    /// - `WriteFailed`: the upload and/or the index insert failed
    #[tracing::instrument(skip(self, runs), fields(run_count = runs.len()))]
    pub async fn write_runs(&self, runs: &[RunIn], size_hint: usize) -> Result<Vec<Uuid>> {
        let batch = self.encoder.encode(runs, size_hint)?;
        self.write_batch(batch).await
    }

    /// Persist an already encoded batch.
    #[tracing::instrument(
        skip(self, batch),
        fields(batch_id = %batch.batch_id, run_count = batch.len(), size_bytes = batch.bytes.len())
    )]
    pub async fn write_batch(&self, batch: EncodedBatch) -> Result<Vec<Uuid>> {
        let started = Instant::now();
        let location = Path::from(batch.key.as_str());
        let rows = batch.index_rows(&self.config.bucket);

        let (upload, insert) = tokio::join!(
            self.object_store.put(&location, batch.bytes.clone()),
            self.index.insert_rows(&rows),
        );

        let ids = batch.ids();
        let failure = WriteFailure {
            upload: upload.err(),
            index: match insert {
                Ok(returned) => check_returned_ids(&ids, returned).err(),
                Err(e) => Some(e),
            },
        };

        WRITE_LATENCY.observe(started.elapsed().as_secs_f64());
        let size_bytes = batch.bytes.len();
        self.pool.reclaim(batch.bytes);

        if failure.upload.is_some() || failure.index.is_some() {
            BATCHES_WRITTEN_TOTAL
                .with_label_values(&[failure.status()])
                .inc();

            if failure.upload.is_none() {
                tracing::warn!(
                    key = %location,
                    "Index insert failed after blob upload; blob is orphaned"
                );
            }
            tracing::error!(key = %location, error = %failure, "Batch write failed");
            return Err(Error::WriteFailed(failure));
        }

        BATCHES_WRITTEN_TOTAL.with_label_values(&["ok"]).inc();
        RUNS_WRITTEN_TOTAL.inc_by(ids.len() as u64);
        BLOB_BYTES_WRITTEN_TOTAL.inc_by(size_bytes as u64);

        tracing::info!(
            key = %location,
            run_count = ids.len(),
            size_bytes,
            "Wrote batch"
        );

        Ok(ids)
    }
}

/// The index must report exactly the submitted ids, in any order.
fn check_returned_ids(
    submitted: &[Uuid],
    returned: Vec<Uuid>,
) -> std::result::Result<(), MetadataError> {
    let expected: HashSet<_> = submitted.iter().collect();
    let actual: HashSet<_> = returned.iter().collect();

    if returned.len() != submitted.len() || expected != actual {
        return Err(MetadataError::InvalidRow(format!(
            "index returned {} ids for {} submitted runs",
            returned.len(),
            submitted.len()
        )));
    }
    Ok(())
}
