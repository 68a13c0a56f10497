//! Upload Routes
//!
//! Endpoints:
//! - POST /upload - Multipart image upload (field `image`)
//! - GET /api/v1/uploads - Upload history as JSON

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::{ClientAddr, SessionUser};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::upload::{validate_file_name, validate_size, HistoryEntry, UploadResponse, IMAGE_FIELD};

/// Room for multipart framing on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the upload router
pub fn router(max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_bytes.saturating_add(MULTIPART_OVERHEAD))),
        )
        .route("/api/v1/uploads", get(history))
}

/// POST /upload
async fn upload(
    State(state): State<AppState>,
    session: SessionUser,
    ClientAddr(ip): ClientAddr,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let max_bytes = state.config().upload.max_bytes;
    let mut file: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e.body_text())))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e.body_text())))?;

        file = Some((file_name, data.to_vec()));
        break;
    }

    let Some((file_name, data)) = file else {
        return Err(AppError::Validation("Please choose a file to upload".to_string()));
    };

    validate_size(data.len(), max_bytes)?;
    validate_file_name(file_name.as_deref())?;

    tracing::debug!(
        user_id = %session.user.id,
        file_name = ?file_name,
        size = data.len(),
        "Upload received"
    );

    let outcome = state
        .uploads()
        .handle_upload(state.db(), &session.user.id, &data, &ip)
        .await?;

    Ok(Json(UploadResponse::from_outcome(outcome)))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct HistoryResponse {
    success: bool,
    uploads: Vec<HistoryEntry>,
}

/// GET /api/v1/uploads
async fn history(
    State(state): State<AppState>,
    session: SessionUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let max = state.config().upload.history_cap();
    let limit = query.limit.unwrap_or(max).clamp(1, max);

    let uploads = state
        .uploads()
        .history(state.db(), &session.user.id, limit)
        .await?;

    Ok(Json(HistoryResponse {
        success: true,
        uploads,
    }))
}
