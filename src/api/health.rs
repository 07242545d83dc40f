use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
    storage_ready: bool,
}

/// Reports whether the staging root is still a usable directory.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage_ready = tokio::fs::metadata(state.checker.storage_root())
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);

    let status = if storage_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            ok: storage_ready,
            storage_ready,
        }),
    )
}
