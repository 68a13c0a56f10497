//! Route modules for imgden

pub mod health;
pub mod pages;
pub mod share;
pub mod upload;

use axum::{routing::get, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let static_dir = state.config().server.static_dir.clone();
    let max_bytes = state.config().upload.max_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .merge(pages::router())
        .merge(upload::router(max_bytes))
        .merge(share::router())
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
