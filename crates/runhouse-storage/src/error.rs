//! Storage Error Types
//!
//! ## Error Categories
//!
//! ### Client Errors (no I/O attempted)
//! - `InvalidBatch`: empty submission or malformed identifier at a given index
//! - `Encoding`: a payload field could not be serialized
//!
//! ### Dependency Errors
//! - `WriteFailed`: blob upload and/or index insert failed; carries both outcomes
//!
//! ### Lookup Errors
//! - `RunNotFound`: no index row for the id (also used when the index lookup itself fails)

use runhouse_core::CoreError;
use runhouse_metadata::MetadataError;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidBatch(#[from] CoreError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Batch write failed: {0}")]
    WriteFailed(WriteFailure),

    #[error("Run with ID {0} not found")]
    RunNotFound(Uuid),
}

/// Outcome of a failed batch write.
///
/// Both sub-operations always run to completion, so either side (or both) may
/// be populated.
#[derive(Debug)]
pub struct WriteFailure {
    /// Blob upload error, if the upload failed
    pub upload: Option<object_store::Error>,

    /// Index insert error, if the insert failed
    pub index: Option<MetadataError>,
}

impl WriteFailure {
    /// True when the only problem is a run id that already exists.
    pub fn is_duplicate_id(&self) -> bool {
        self.upload.is_none() && matches!(self.index, Some(MetadataError::DuplicateId(_)))
    }

    /// Metric label for this failure.
    pub fn status(&self) -> &'static str {
        match (&self.upload, &self.index) {
            (Some(_), Some(_)) => "both_failed",
            (Some(_), None) => "upload_failed",
            _ => "index_failed",
        }
    }
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.upload, &self.index) {
            (Some(upload), Some(index)) => write!(
                f,
                "blob upload failed: {}; index insert failed: {}",
                upload, index
            ),
            (Some(upload), None) => write!(f, "blob upload failed: {}", upload),
            (None, Some(index)) => write!(f, "index insert failed: {}", index),
            (None, None) => f.write_str("unknown failure"),
        }
    }
}
