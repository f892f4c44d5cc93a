//! API Error Types
//!
//! Every handler error renders as `{"error": "<message>"}` with a status code:
//!
//! - `BadRequest` (400): malformed body, empty batch, invalid identifier or payload
//! - `NotFound` (404): no such run
//! - `Conflict` (409): a submitted run id already exists
//! - `Internal` (500): blob store or index failure

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use runhouse_storage::Error as StorageError;
use thiserror::Error;

use crate::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidBatch(e) => ApiError::BadRequest(e.to_string()),
            StorageError::RunNotFound(_) => ApiError::NotFound(e.to_string()),
            StorageError::WriteFailed(failure) if failure.is_duplicate_id() => {
                ApiError::Conflict(format!("failed to persist runs: {}", failure))
            }
            StorageError::WriteFailed(failure) => {
                ApiError::Internal(format!("failed to persist runs: {}", failure))
            }
            StorageError::Encoding(e) => {
                ApiError::Internal(format!("failed to encode runs: {}", e))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
