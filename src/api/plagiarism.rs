use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};

use crate::{
    app::AppState,
    error::{AppError, AppResult},
    model::{SimilarityRecord, UploadedDocument},
};

/// Multipart field that carries the uploaded documents.
pub const UPLOAD_FIELD: &str = "docs";

pub async fn check_plagiarism(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<Vec<SimilarityRecord>>> {
    let mut documents = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let name = match field.file_name() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => {
                return Err(AppError::BadRequest(
                    "every uploaded document needs a file name".into(),
                ))
            }
        };
        let bytes = field.bytes().await.map_err(multipart_error)?;
        documents.push(UploadedDocument::new(name, bytes));
    }

    tracing::debug!(documents = documents.len(), "upload batch received");

    let records = state.checker.check(documents).await?;
    Ok(Json(records))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}
