//! API models for REST endpoints

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of a successful `POST /runs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRunsResponse {
    pub status: String,

    /// Assigned ids, in submission order
    pub run_ids: Vec<Uuid>,
}

impl CreateRunsResponse {
    pub fn created(run_ids: Vec<Uuid>) -> Self {
        Self {
            status: "created".to_string(),
            run_ids,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
