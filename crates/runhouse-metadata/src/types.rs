//! Index row types

use runhouse_core::{BlobRef, PayloadField};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted metadata for one run.
///
/// Payloads are not stored here. Each `*_ref` column holds an encoded
/// [`BlobRef`] into the batch blob, or the empty string for "no payload".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    pub id: Uuid,
    pub trace_id: Uuid,
    pub name: String,
    pub inputs_ref: String,
    pub outputs_ref: String,
    pub metadata_ref: String,
}

impl IndexRow {
    /// Encoded reference stored for `field`.
    pub fn reference(&self, field: PayloadField) -> &str {
        match field {
            PayloadField::Inputs => &self.inputs_ref,
            PayloadField::Outputs => &self.outputs_ref,
            PayloadField::Metadata => &self.metadata_ref,
        }
    }

    /// Decoded reference for `field`; `None` means "no payload".
    pub fn blob_ref(&self, field: PayloadField) -> Option<BlobRef> {
        BlobRef::decode(self.reference(field))
    }
}
