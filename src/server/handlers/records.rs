//! Record endpoints, forwarding to the configured record store.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::error;

use crate::models::{DocumentLabel, RecordStatus};
use crate::store::StoreError;

use super::super::AppState;
use super::helpers::error_response;

fn store_error(e: StoreError) -> Response {
    match e {
        StoreError::NotFound(id) => {
            error_response(StatusCode::NOT_FOUND, format!("record not found: {}", id))
        }
        other => {
            error!("Store error: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "store request failed")
        }
    }
}

/// `GET /api/records`
pub async fn list_records(State(state): State<AppState>) -> Response {
    match state.records.list().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => store_error(e),
    }
}

/// `GET /api/records/:id`
pub async fn get_record(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.records.get(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("record not found: {}", id)),
        Err(e) => store_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: RecordStatus,
}

/// `PATCH /api/records/:id/status` - flag a record active/archived/deleted.
/// Flagging `deleted` does not purge files; hard removal is `DELETE`.
pub async fn update_record_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Response {
    let mut record = match state.records.get(&id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, format!("record not found: {}", id))
        }
        Err(e) => return store_error(e),
    };

    record.set_status(body.status);
    match state.records.update(&record).await {
        Ok(()) => Json(record).into_response(),
        Err(e) => store_error(e),
    }
}

/// `DELETE /api/records/:id` - hard delete from the store.
pub async fn delete_record(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.records.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error(e),
    }
}

/// Signed URLs are valid for one hour.
const SIGNED_URL_EXPIRY_SECS: u64 = 3600;

/// `GET /api/records/:id/files/:label/url` - signed download URL for one
/// document type of a record.
pub async fn record_file_url(
    State(state): State<AppState>,
    Path((id, label)): Path<(String, String)>,
) -> Response {
    let Some(label) = DocumentLabel::parse(&label) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unknown document type '{}'", label),
        );
    };

    let record = match state.records.get(&id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, format!("record not found: {}", id))
        }
        Err(e) => return store_error(e),
    };

    let Some(path) = record.files.get(&label) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("record has no file for '{}'", label),
        );
    };

    match state.records.signed_url(path, SIGNED_URL_EXPIRY_SECS).await {
        Ok(url) => Json(serde_json::json!({ "url": url })).into_response(),
        Err(e) => store_error(e),
    }
}
