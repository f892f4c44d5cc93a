//! Run ingestion and retrieval endpoints

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use runhouse_core::RunIn;
use uuid::Uuid;

use crate::{error::ApiError, models::CreateRunsResponse, AppState};

const INVALID_BODY: &str = "invalid JSON body, expected an array of runs";

/// `POST /runs`: persist a batch of runs as one blob plus one index row each.
///
/// The raw body length doubles as the blob buffer size hint.
pub async fn create_runs(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateRunsResponse>), ApiError> {
    let runs: Vec<RunIn> = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected run batch body");
        ApiError::BadRequest(INVALID_BODY.to_string())
    })?;

    let run_ids = state.writer.write_runs(&runs, body.len()).await?;

    Ok((StatusCode::CREATED, Json(CreateRunsResponse::created(run_ids))))
}

/// `GET /runs/:id`: stream one run back as JSON.
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest("id must be a valid UUID".to_string()))?;

    let stream = state.reader.read_run(id).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(stream),
    )
        .into_response())
}
