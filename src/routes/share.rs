//! Share links: GET /s/:short_id redirects to the public image URL

use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::get,
    Router,
};

use crate::error::Result;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/s/:short_id", get(resolve))
}

async fn resolve(
    State(state): State<AppState>,
    Path(short_id): Path<String>,
) -> Result<Redirect> {
    let (upload, url) = state
        .uploads()
        .resolve_short_id(state.db(), &short_id)
        .await?;

    tracing::debug!(short_id = %short_id, upload_id = %upload.id, "Share link resolved");
    Ok(Redirect::to(&url))
}
