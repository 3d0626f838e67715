//! Upload intake and the streaming progress relay.

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::channel::mpsc;
use futures::StreamExt;
use tracing::error;

use crate::pipeline::{run_pipeline, ProgressEvent, CHANNEL_CAPACITY};

use super::super::AppState;
use super::helpers::error_response;

/// `POST /api/process-file` - accept one PDF under the multipart field
/// `file`, launch the classifier, and stream NDJSON progress events until
/// the pipeline finishes. The stream ends only after the terminal event.
pub async fn process_file(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let uploads_dir = state.settings.uploads_dir();
    if let Err(e) = tokio::fs::create_dir_all(&uploads_dir).await {
        error!("Cannot create uploads dir: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot store upload");
    }

    let pdf_path = match save_upload(&mut multipart, &uploads_dir).await {
        Ok(Some(path)) => path,
        Ok(None) => {
            return error_response(StatusCode::BAD_REQUEST, "no file provided in field 'file'")
        }
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<ProgressEvent>(CHANNEL_CAPACITY);

    // The pipeline runs to completion even if the client disconnects;
    // dropped sends are logged, not fatal.
    tokio::spawn(run_pipeline(state.pipeline_context(), pdf_path, tx));

    let stream = rx.map(|event| {
        let line = match serde_json::to_string(&event) {
            Ok(json) => json + "\n",
            Err(e) => {
                error!("Cannot serialize progress event: {}", e);
                "{\"status\":\"error\",\"error\":\"serialization failure\"}\n".to_string()
            }
        };
        Ok::<Bytes, Infallible>(Bytes::from(line.into_bytes()))
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Pull the `file` field out of the multipart body and write it under its
/// original filename. A same-named re-upload silently overwrites.
async fn save_upload(
    multipart: &mut Multipart,
    uploads_dir: &Path,
) -> Result<Option<PathBuf>, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid multipart body: {}", e),
                ))
            }
        };

        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(|n| n.to_string()) else {
            continue;
        };
        // Keep only the final component of whatever the client sent
        let Some(filename) = Path::new(&filename).file_name().map(|n| n.to_os_string()) else {
            continue;
        };

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("failed reading upload: {}", e),
                ))
            }
        };

        let path = uploads_dir.join(filename);
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            error!("Cannot write upload {}: {}", path.display(), e);
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "cannot store upload",
            ));
        }
        return Ok(Some(path));
    }
}
