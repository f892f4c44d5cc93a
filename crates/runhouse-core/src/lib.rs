//! RunHouse Core
//!
//! Shared types for the run ingestion engine:
//!
//! - [`RunIn`]: a run as submitted by a client, before identifiers are validated
//! - [`PayloadField`]: the three payload fields packed into batch blobs
//! - [`BlobRef`]: a byte-range reference into a batch blob, stored as text in the index

pub mod error;
pub mod reference;
pub mod run;

pub use error::{CoreError, Result};
pub use reference::{BlobRef, REF_SCHEME};
pub use run::{PayloadField, RunIn};
