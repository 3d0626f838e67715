//! Manifest read endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use super::super::AppState;
use super::helpers::error_response;

/// `GET /api/results/raw` - the classifier's own `risultati.json`, verbatim.
pub async fn raw_results(State(state): State<AppState>) -> Response {
    let path = state.settings.workspace_manifest_path();
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) => {
            error!("Cannot read {}: {}", path.display(), e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot read results");
        }
    };
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => Json(value).into_response(),
        Err(e) => {
            error!("Invalid JSON in {}: {}", path.display(), e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "results are not valid JSON")
        }
    }
}

/// `GET /api/results/working` - the path-rewritten working manifest.
pub async fn working_results(State(state): State<AppState>) -> Response {
    match state.manifest.load().await {
        Ok(manifest) => Json(manifest).into_response(),
        Err(e) => {
            error!("Cannot load working manifest: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot read working results")
        }
    }
}
