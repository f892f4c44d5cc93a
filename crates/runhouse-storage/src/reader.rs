//! Run Reader
//!
//! The read coordinator. Reassembles one run from its index row and three
//! range reads against the batch blob, streaming the result as JSON.
//!
//! ## Read Flow
//!
//! ```text
//! read_run(id)
//!     ↓
//! index.get_row(id)                 ← missing or failed lookup → RunNotFound
//!     ↓
//! spawn ┌ range(inputs)   ┐
//!       ├ range(outputs)  ┤        ← concurrent, each falls back to {}
//!       └ range(metadata) ┘
//!     ↓
//! RunStream
//!   {"id":…,"trace_id":…,"name":…,"inputs":  ← emitted immediately
//!   <inputs bytes>                             ← after inputs read completes
//!   ,"outputs":<outputs bytes>
//!   ,"metadata":<metadata bytes>}
//! ```
//!
//! ## Field Fallback
//!
//! A field resolves to `{}` when its reference is empty or undecodable, its
//! span is empty, it points into another bucket, the range read fails, fewer
//! bytes come back than the span covers, or the bytes are not a valid JSON
//! object. One bad field never fails the read.
//!
//! ## Cancellation
//!
//! The range reads run as spawned tasks owned by the [`RunStream`]. Dropping
//! the stream (e.g. the client disconnects) aborts whatever is still in flight.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use object_store::{path::Path, ObjectStore};
use runhouse_core::{BlobRef, PayloadField};
use runhouse_metadata::{IndexRow, IndexStore};
use runhouse_observability::metrics::{FIELD_FALLBACKS_TOTAL, RANGE_READ_LATENCY, RUNS_READ_TOTAL};
use serde_json::Value;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    config::StorageConfig,
    error::{Error, Result},
};

const EMPTY_OBJECT: &[u8] = b"{}";

/// Reads runs back from the index and blob store.
pub struct RunReader {
    object_store: Arc<dyn ObjectStore>,
    index: Arc<dyn IndexStore>,
    config: StorageConfig,
}

impl RunReader {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        index: Arc<dyn IndexStore>,
        config: StorageConfig,
    ) -> Self {
        Self {
            object_store,
            index,
            config,
        }
    }

    /// Look up `id` and start reading its payload fields.
    ///
    /// Returns as soon as the index row is known; the returned stream yields
    /// the run JSON as the field reads complete.
    ///
    /// # Errors
    ///
    /// - `RunNotFound`: no row for `id`, or the index lookup failed
    #[tracing::instrument(skip(self), fields(run_id = %id))]
    pub async fn read_run(&self, id: Uuid) -> Result<RunStream> {
        let row = match self.index.get_row(id).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                RUNS_READ_TOTAL.with_label_values(&["not_found"]).inc();
                return Err(Error::RunNotFound(id));
            }
            Err(e) => {
                tracing::error!(error = %e, "Index lookup failed; reporting run as not found");
                RUNS_READ_TOTAL.with_label_values(&["not_found"]).inc();
                return Err(Error::RunNotFound(id));
            }
        };

        RUNS_READ_TOTAL.with_label_values(&["found"]).inc();

        let fields = PayloadField::ALL.map(|field| (field, self.spawn_field(&row, field)));
        Ok(RunStream::new(&row, fields))
    }

    /// Read `id` fully and parse it.
    pub async fn read_run_value(&self, id: Uuid) -> Result<Value> {
        let bytes = self.read_run(id).await?.into_bytes().await;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn spawn_field(&self, row: &IndexRow, field: PayloadField) -> JoinHandle<Bytes> {
        let store = self.object_store.clone();
        let bucket = self.config.bucket.clone();
        let reference = row.reference(field).to_string();
        let run_id = row.id;

        tokio::spawn(async move {
            match fetch_field(store.as_ref(), &bucket, field, &reference).await {
                Ok(bytes) => bytes,
                Err(fallback) => {
                    FIELD_FALLBACKS_TOTAL
                        .with_label_values(&[field.as_str(), fallback.reason()])
                        .inc();
                    match fallback {
                        FieldFallback::NoReference => {
                            tracing::debug!(run_id = %run_id, field = %field, "No stored payload");
                        }
                        other => {
                            tracing::warn!(
                                run_id = %run_id,
                                field = %field,
                                reference = %reference,
                                error = %other,
                                "Serving empty object for unreadable field"
                            );
                        }
                    }
                    Bytes::from_static(EMPTY_OBJECT)
                }
            }
        })
    }
}

/// Why a field was served as `{}`.
#[derive(Debug)]
enum FieldFallback {
    NoReference,
    Undecodable,
    EmptySpan,
    ForeignContainer(String),
    Store(object_store::Error),
    ShortRead { expected: u64, actual: usize },
    InvalidJson(serde_json::Error),
    NotObject,
}

impl FieldFallback {
    fn reason(&self) -> &'static str {
        match self {
            FieldFallback::NoReference => "empty_reference",
            FieldFallback::Undecodable => "undecodable_reference",
            FieldFallback::EmptySpan => "empty_span",
            FieldFallback::ForeignContainer(_) => "foreign_container",
            FieldFallback::Store(_) => "store_error",
            FieldFallback::ShortRead { .. } => "short_read",
            FieldFallback::InvalidJson(_) => "invalid_json",
            FieldFallback::NotObject => "not_object",
        }
    }
}

impl fmt::Display for FieldFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldFallback::NoReference => f.write_str("no reference"),
            FieldFallback::Undecodable => f.write_str("malformed reference"),
            FieldFallback::EmptySpan => f.write_str("empty byte range"),
            FieldFallback::ForeignContainer(c) => write!(f, "reference points into bucket {}", c),
            FieldFallback::Store(e) => write!(f, "range read failed: {}", e),
            FieldFallback::ShortRead { expected, actual } => {
                write!(f, "short read: expected {} bytes, got {}", expected, actual)
            }
            FieldFallback::InvalidJson(e) => write!(f, "invalid JSON in range: {}", e),
            FieldFallback::NotObject => f.write_str("range does not hold a JSON object"),
        }
    }
}

async fn fetch_field(
    store: &dyn ObjectStore,
    bucket: &str,
    field: PayloadField,
    reference: &str,
) -> std::result::Result<Bytes, FieldFallback> {
    if reference.is_empty() {
        return Err(FieldFallback::NoReference);
    }
    let blob_ref = BlobRef::decode(reference).ok_or(FieldFallback::Undecodable)?;
    if blob_ref.is_empty() {
        return Err(FieldFallback::EmptySpan);
    }
    // Only the configured bucket is read. Rows written under an earlier
    // S3_BUCKET_NAME resolve to {} and are counted as foreign_container.
    if blob_ref.container != bucket {
        return Err(FieldFallback::ForeignContainer(blob_ref.container));
    }

    let start = usize::try_from(blob_ref.start).map_err(|_| FieldFallback::Undecodable)?;
    let end = usize::try_from(blob_ref.end).map_err(|_| FieldFallback::Undecodable)?;

    let timer = RANGE_READ_LATENCY
        .with_label_values(&[field.as_str()])
        .start_timer();
    let bytes = store
        .get_range(&Path::from(blob_ref.key.as_str()), start..end)
        .await
        .map_err(FieldFallback::Store)?;
    timer.observe_duration();

    if bytes.len() as u64 != blob_ref.len() {
        return Err(FieldFallback::ShortRead {
            expected: blob_ref.len(),
            actual: bytes.len(),
        });
    }
    serde_json::from_slice::<serde::de::IgnoredAny>(&bytes).map_err(FieldFallback::InvalidJson)?;
    if bytes.iter().find(|b| !b.is_ascii_whitespace()) != Some(&b'{') {
        return Err(FieldFallback::NotObject);
    }

    Ok(bytes)
}

enum Chunk {
    Ready(Bytes),
    Field(PayloadField, JoinHandle<Bytes>),
}

/// Streamed JSON body of one run.
///
/// Yields the literal prefix right away, then each field's bytes in the order
/// `inputs`, `outputs`, `metadata` as its read finishes.
pub struct RunStream {
    chunks: VecDeque<Chunk>,
}

impl RunStream {
    fn new(row: &IndexRow, fields: [(PayloadField, JoinHandle<Bytes>); 3]) -> Self {
        let mut chunks = VecDeque::with_capacity(fields.len() * 2 + 1);

        let mut text = format!(
            "{{\"id\":\"{}\",\"trace_id\":\"{}\",\"name\":{}",
            row.id,
            row.trace_id,
            Value::String(row.name.clone())
        );
        for (field, handle) in fields {
            text.push_str(",\"");
            text.push_str(field.as_str());
            text.push_str("\":");
            chunks.push_back(Chunk::Ready(Bytes::from(std::mem::take(&mut text))));
            chunks.push_back(Chunk::Field(field, handle));
        }
        chunks.push_back(Chunk::Ready(Bytes::from_static(b"}")));

        Self { chunks }
    }

    /// Drain the stream into one buffer.
    pub async fn into_bytes(mut self) -> Bytes {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.next().await {
            match chunk {
                Ok(bytes) => out.extend_from_slice(&bytes),
                Err(never) => match never {},
            }
        }
        out.freeze()
    }
}

impl Stream for RunStream {
    type Item = std::result::Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let bytes = match this.chunks.front_mut() {
            None => return Poll::Ready(None),
            Some(Chunk::Ready(bytes)) => std::mem::take(bytes),
            Some(Chunk::Field(field, handle)) => match Pin::new(handle).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(bytes)) => bytes,
                Poll::Ready(Err(e)) => {
                    tracing::warn!(field = %field, error = %e, "Field read task failed");
                    Bytes::from_static(EMPTY_OBJECT)
                }
            },
        };
        this.chunks.pop_front();
        Poll::Ready(Some(Ok(bytes)))
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        for chunk in &self.chunks {
            if let Chunk::Field(_, handle) = chunk {
                handle.abort();
            }
        }
    }
}
