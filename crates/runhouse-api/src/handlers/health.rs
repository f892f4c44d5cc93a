//! Health endpoint

use axum::Json;

use crate::models::HealthResponse;

/// Liveness check; does not touch the stores.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
