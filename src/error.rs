use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Please upload at least 2 files (received {0})")]
    InsufficientInput(usize),
    #[error("duplicate file name in batch: {0}")]
    DuplicateName(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("upload too large: {0}")]
    PayloadTooLarge(String),
    #[error("unsupported file format: {name}")]
    UnsupportedFormat { name: String },
    #[error("failed to extract text from {name}: {reason}")]
    Extraction { name: String, reason: String },
    #[error("failed to stage uploaded files: {0}")]
    Staging(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InsufficientInput(_) | AppError::DuplicateName(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedFormat { .. }
            | AppError::Extraction { .. }
            | AppError::Staging(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        match &self {
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
            }
            err if status.is_server_error() => {
                tracing::error!(error = %err, "batch aborted");
            }
            err => {
                tracing::warn!(error = %err, "rejected request");
            }
        }

        let body = Json(ErrorBody {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
