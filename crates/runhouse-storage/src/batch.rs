//! Batch Encoder
//!
//! Packs a submitted batch of runs into one JSON array blob and records, for
//! every run, where each payload field landed inside that blob.
//!
//! ## Blob Layout
//!
//! ```text
//! [{"id":"…","trace_id":"…","name":"…","inputs":{…},"outputs":{…},"metadata":{…}},{…}]
//!                                                 ▲    ▲
//!                                             start    end   (half-open, per field)
//! ```
//!
//! ## Offset Measurement
//!
//! Offsets are taken from the length of the output buffer immediately before
//! and after each payload value is serialized into it. They are never searched
//! for or recomputed, so they always describe the exact uploaded bytes: a range
//! read of `start..end` yields that field's JSON and nothing else, even when
//! two fields (or a field and a name) serialize identically.
//!
//! Absent or `null` payloads are written as `{}` and still get a two-byte span.
//!
//! ## Validation
//!
//! Every run's identifiers and payload shapes are checked before a single byte
//! is written. One bad identifier, or one payload that is not a JSON object,
//! rejects the whole batch.

use bytes::{buf::Writer, BufMut, Bytes, BytesMut};
use runhouse_core::{BlobRef, CoreError, PayloadField, RunIn};
use runhouse_metadata::IndexRow;
use std::ops::Range;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::pool::BufferPool;

const EMPTY_OBJECT: &[u8] = b"{}";

/// Object key for a batch blob.
pub fn batch_key(batch_id: Uuid) -> String {
    format!("batches/{}.json", batch_id)
}

/// One run's identity and field spans within an encoded batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRun {
    pub id: Uuid,
    pub trace_id: Uuid,
    pub name: String,
    spans: [Range<u64>; 3],
}

impl EncodedRun {
    /// Byte span of `field` within the blob.
    pub fn span(&self, field: PayloadField) -> Range<u64> {
        self.spans[field_slot(field)].clone()
    }

    /// Index row referencing this run's fields in blob `key` of `container`.
    pub fn index_row(&self, container: &str, key: &str) -> IndexRow {
        let reference = |field: PayloadField| {
            let span = self.span(field);
            BlobRef::new(container, key, span.start, span.end, field.as_str()).encode()
        };

        IndexRow {
            id: self.id,
            trace_id: self.trace_id,
            name: self.name.clone(),
            inputs_ref: reference(PayloadField::Inputs),
            outputs_ref: reference(PayloadField::Outputs),
            metadata_ref: reference(PayloadField::Metadata),
        }
    }
}

/// A fully serialized batch, ready to upload.
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    pub batch_id: Uuid,

    /// Object key the blob is uploaded under
    pub key: String,

    /// The blob
    pub bytes: Bytes,

    /// Runs in submission order
    pub runs: Vec<EncodedRun>,
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Run identifiers in submission order.
    pub fn ids(&self) -> Vec<Uuid> {
        self.runs.iter().map(|r| r.id).collect()
    }

    /// One index row per run, in submission order.
    pub fn index_rows(&self, container: &str) -> Vec<IndexRow> {
        self.runs
            .iter()
            .map(|run| run.index_row(container, &self.key))
            .collect()
    }

    /// Raw blob bytes of one run's field.
    pub fn field_bytes(&self, run: usize, field: PayloadField) -> &[u8] {
        let span = self.runs[run].span(field);
        &self.bytes[span.start as usize..span.end as usize]
    }
}

/// Serializes runs into batch blobs.
#[derive(Debug, Clone)]
pub struct BatchEncoder {
    pool: Arc<BufferPool>,
}

impl BatchEncoder {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self { pool }
    }

    /// Encode `runs` into a single blob.
    ///
    /// `size_hint` sizes the output buffer; the submitted request body length is
    /// a good estimate.
    ///
    /// # Errors
    ///
    /// - `InvalidBatch`: empty input, a malformed `id`/`trace_id`, or a payload
    ///   that is not a JSON object (each with its index)
    /// - `Encoding`: a payload value failed to serialize
    pub fn encode(&self, runs: &[RunIn], size_hint: usize) -> Result<EncodedBatch> {
        if runs.is_empty() {
            return Err(CoreError::EmptyBatch.into());
        }

        let ids = runs
            .iter()
            .enumerate()
            .map(|(i, run)| {
                run.check_payloads(i)?;
                run.resolve_ids(i)
            })
            .collect::<runhouse_core::Result<Vec<_>>>()?;

        let mut out = self.pool.acquire(size_hint).writer();
        let encoded = match write_batch(&mut out, runs, &ids) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.pool.release(out.into_inner());
                return Err(e);
            }
        };

        let batch_id = Uuid::new_v4();
        let bytes = out.into_inner().freeze();

        tracing::debug!(
            batch_id = %batch_id,
            runs = encoded.len(),
            size_bytes = bytes.len(),
            "Encoded batch"
        );

        Ok(EncodedBatch {
            batch_id,
            key: batch_key(batch_id),
            bytes,
            runs: encoded,
        })
    }
}

fn write_batch(
    out: &mut Writer<BytesMut>,
    runs: &[RunIn],
    ids: &[(Uuid, Uuid)],
) -> Result<Vec<EncodedRun>> {
    let mut encoded = Vec::with_capacity(runs.len());

    out.get_mut().put_u8(b'[');
    for (i, (run, &(id, trace_id))) in runs.iter().zip(ids).enumerate() {
        if i > 0 {
            out.get_mut().put_u8(b',');
        }

        out.get_mut().put_slice(b"{\"id\":");
        serde_json::to_writer(&mut *out, &id)?;
        out.get_mut().put_slice(b",\"trace_id\":");
        serde_json::to_writer(&mut *out, &trace_id)?;
        out.get_mut().put_slice(b",\"name\":");
        serde_json::to_writer(&mut *out, &run.name)?;

        let mut spans: [Range<u64>; 3] = [0..0, 0..0, 0..0];
        for field in PayloadField::ALL {
            out.get_mut().put_slice(b",\"");
            out.get_mut().put_slice(field.as_str().as_bytes());
            out.get_mut().put_slice(b"\":");

            let start = out.get_ref().len() as u64;
            match run.payload(field) {
                Some(value) => serde_json::to_writer(&mut *out, value)?,
                None => out.get_mut().put_slice(EMPTY_OBJECT),
            }
            let end = out.get_ref().len() as u64;
            debug_assert!(end > start);

            spans[field_slot(field)] = start..end;
        }
        out.get_mut().put_u8(b'}');

        encoded.push(EncodedRun {
            id,
            trace_id,
            name: run.name.clone(),
            spans,
        });
    }
    out.get_mut().put_u8(b']');

    Ok(encoded)
}

fn field_slot(field: PayloadField) -> usize {
    match field {
        PayloadField::Inputs => 0,
        PayloadField::Outputs => 1,
        PayloadField::Metadata => 2,
    }
}
