//! Core Error Types
//!
//! Validation failures raised while turning submitted runs into identifiers.
//! Every variant is a client error: it is detected before any I/O and the
//! whole batch is rejected.

use thiserror::Error;

use crate::run::PayloadField;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("No runs provided")]
    EmptyBatch,

    #[error("invalid id at index {0}")]
    InvalidId(usize),

    #[error("invalid trace_id at index {0}")]
    InvalidTraceId(usize),

    #[error("{field} at index {index} must be a JSON object")]
    InvalidPayload { index: usize, field: PayloadField },
}

pub type Result<T> = std::result::Result<T, CoreError>;
