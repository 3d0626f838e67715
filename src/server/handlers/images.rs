//! Working-image listing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use super::super::AppState;
use super::helpers::{download_url, error_response};

/// `GET /api/images` - download-proxy URLs for every file in the working
/// images directory, sorted by filename.
pub async fn list_working_images(State(state): State<AppState>) -> Response {
    let images_dir = state.settings.working_images_dir();
    let mut entries = match tokio::fs::read_dir(&images_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("Cannot read {}: {}", images_dir.display(), e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot list images");
        }
    };

    let mut paths = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                    paths.push(entry.path());
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Cannot read {}: {}", images_dir.display(), e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot list images");
            }
        }
    }
    paths.sort();

    let urls: Vec<String> = paths.iter().map(|p| download_url(p)).collect();
    Json(urls).into_response()
}
