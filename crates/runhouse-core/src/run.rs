//! Submitted Runs
//!
//! [`RunIn`] is the wire shape of one run in a `POST /runs` body. Identifiers
//! arrive as strings and are only checked when the batch is encoded, so that a
//! malformed identifier can be reported with the index of the offending run.
//! Payload fields follow the same rule: each must be a JSON object, absent, or
//! `null`.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One run as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunIn {
    /// Caller-chosen identifier; generated when absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub trace_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub inputs: Option<Value>,

    #[serde(default)]
    pub outputs: Option<Value>,

    #[serde(default)]
    pub metadata: Option<Value>,
}

impl RunIn {
    pub fn new(trace_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.to_string(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_payload(mut self, field: PayloadField, value: Value) -> Self {
        match field {
            PayloadField::Inputs => self.inputs = Some(value),
            PayloadField::Outputs => self.outputs = Some(value),
            PayloadField::Metadata => self.metadata = Some(value),
        }
        self
    }

    /// Resolve `(id, trace_id)` for the run at position `index` in its batch.
    ///
    /// A missing or empty `id` gets a fresh v4 UUID.
    pub fn resolve_ids(&self, index: usize) -> Result<(Uuid, Uuid)> {
        let id = match self.id.as_deref() {
            Some(s) if !s.is_empty() => {
                Uuid::parse_str(s).map_err(|_| CoreError::InvalidId(index))?
            }
            _ => Uuid::new_v4(),
        };
        let trace_id =
            Uuid::parse_str(&self.trace_id).map_err(|_| CoreError::InvalidTraceId(index))?;
        Ok((id, trace_id))
    }

    /// Check that every present payload of the run at `index` is a JSON object.
    pub fn check_payloads(&self, index: usize) -> Result<()> {
        for field in PayloadField::ALL {
            match self.payload(field) {
                Some(value) if !value.is_object() => {
                    return Err(CoreError::InvalidPayload { index, field });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Payload value for `field`, or `None` if absent or null.
    pub fn payload(&self, field: PayloadField) -> Option<&Value> {
        let value = match field {
            PayloadField::Inputs => self.inputs.as_ref(),
            PayloadField::Outputs => self.outputs.as_ref(),
            PayloadField::Metadata => self.metadata.as_ref(),
        };
        value.filter(|v| !v.is_null())
    }
}

/// The payload fields stored out-of-line in batch blobs, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadField {
    Inputs,
    Outputs,
    Metadata,
}

impl PayloadField {
    pub const ALL: [PayloadField; 3] = [
        PayloadField::Inputs,
        PayloadField::Outputs,
        PayloadField::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadField::Inputs => "inputs",
            PayloadField::Outputs => "outputs",
            PayloadField::Metadata => "metadata",
        }
    }
}

impl std::fmt::Display for PayloadField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
