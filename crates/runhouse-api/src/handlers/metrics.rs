//! Prometheus scrape endpoint

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use runhouse_observability::metrics;

use crate::error::ApiError;

/// `GET /metrics`: write, read, fallback and buffer pool series.
pub async fn prometheus_metrics() -> Result<Response, ApiError> {
    let text = metrics::render()
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, metrics::CONTENT_TYPE)], text).into_response())
}
