//! Path-checked download proxy for files in the working area.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::super::AppState;
use super::helpers::{content_type_for, error_response, resolve_in_dir};

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub file: Option<String>,
}

/// `GET /api/download?file=<path>` - stream one file back, but only when the
/// resolved path stays inside the working directory tree. The containment
/// check runs before any read.
pub async fn download_file(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let Some(file) = params.file else {
        return error_response(StatusCode::BAD_REQUEST, "missing file parameter");
    };

    let working_dir = state.settings.working_dir();
    let Some(path) = resolve_in_dir(&working_dir, &file) else {
        return error_response(StatusCode::FORBIDDEN, "access denied");
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("cannot read file: {}", e),
            )
        }
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    (
        [
            (header::CONTENT_TYPE, content_type_for(&path).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}
