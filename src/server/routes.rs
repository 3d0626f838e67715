//! Router configuration for the web server.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Upload + processing pipeline (NDJSON progress stream)
        .route("/api/process-file", post(handlers::process_file))
        // Manual single-document regeneration
        .route("/api/generate-file", post(handlers::generate_file))
        // Manifests
        .route("/api/results/raw", get(handlers::raw_results))
        .route("/api/results/working", get(handlers::working_results))
        // Working images and the path-checked download proxy
        .route("/api/images", get(handlers::list_working_images))
        .route("/api/download", get(handlers::download_file))
        // Push the working manifest to the hosted store
        .route("/api/sync", get(handlers::sync_store))
        // Record endpoints (forwarded to the store)
        .route("/api/records", get(handlers::list_records))
        .route(
            "/api/records/:id",
            get(handlers::get_record).delete(handlers::delete_record),
        )
        .route("/api/records/:id/status", patch(handlers::update_record_status))
        .route(
            "/api/records/:id/files/:label/url",
            get(handlers::record_file_url),
        )
        .route("/api/health", get(handlers::health))
        // Scanned manifests run to dozens of pages; the default 2 MB body
        // limit is far too small for them.
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
