//! Router creation and configuration

use super::handlers::*;
use super::types::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create REST API router
pub fn create_router(state: AppState) -> Router {
    let images = ServeDir::new(state.store.image_dir());

    Router::new()
        .route("/health", get(health))
        .route("/submit", post(submit))
        .route("/download/:filename", get(download))
        .route("/export/:filename", get(export))
        .nest_service("/images", images)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
