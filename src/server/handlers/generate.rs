//! Manual single-document regeneration from selected page images.

use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{error, warn};

use crate::compose::compose_pdf;
use crate::models::DocumentLabel;

use super::super::AppState;
use super::helpers::{error_response, resolve_in_dir};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub fir: String,
    #[serde(rename = "documentType")]
    pub document_type: String,
    #[serde(rename = "selectedImages")]
    pub selected_images: Vec<String>,
}

/// `POST /api/generate-file` - compose a new PDF for one `[fir][label]`
/// manifest entry from the selected page images, update the working
/// manifest, and append a change-history entry to the matching record.
pub async fn generate_file(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    if request.fir.is_empty() || request.document_type.is_empty() || request.selected_images.is_empty()
    {
        return error_response(StatusCode::BAD_REQUEST, "missing fields");
    }
    let Some(label) = DocumentLabel::parse(&request.document_type) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unknown document type '{}'", request.document_type),
        );
    };

    // Each selected image is a download-proxy URL; its `file` parameter
    // must resolve inside the working tree, same check as the proxy itself.
    let working_dir = state.settings.working_dir();
    let mut images: Vec<PathBuf> = Vec::new();
    for reference in &request.selected_images {
        match image_path_from_url(reference, &working_dir) {
            Some(path) => images.push(path),
            None => warn!("Ignoring image reference outside working dir: {}", reference),
        }
    }

    let manifest = match state.manifest.load().await {
        Ok(manifest) => manifest,
        Err(e) => {
            error!("Cannot load working manifest: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot load manifest");
        }
    };

    // Existing manifest entry wins; otherwise derive a path in the output dir
    let target = manifest
        .file_path(&request.fir, label.as_str())
        .cloned()
        .unwrap_or_else(|| {
            let safe_label = label.as_str().replace(' ', "_");
            state
                .settings
                .working_output_dir()
                .join(format!("{}_{}.pdf", request.fir, safe_label))
                .to_string_lossy()
                .into_owned()
        });

    let (pdf_bytes, pages) = match compose_pdf(&images) {
        Ok(result) => result,
        Err(e) => {
            error!("PDF composition failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "PDF composition failed");
        }
    };
    if pages == 0 {
        warn!(
            "Generated document for FIR {} has no pages (all images skipped)",
            request.fir
        );
    }

    if let Some(parent) = Path::new(&target).parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            error!("Cannot create output dir: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot write document");
        }
    }
    if let Err(e) = tokio::fs::write(&target, &pdf_bytes).await {
        error!("Cannot write {}: {}", target, e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot write document");
    }

    if let Err(e) = state
        .manifest
        .update_entry(&request.fir, label.as_str(), &target)
        .await
    {
        error!("Cannot update working manifest: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot update manifest");
    }

    // Best effort: a missing record is logged, not an error
    match state.records.find_by_fir(&request.fir).await {
        Ok(Some(mut record)) => {
            record.set_file(label, target.clone());
            if let Err(e) = state.records.update(&record).await {
                warn!("Cannot update record for FIR {}: {}", request.fir, e);
            }
        }
        Ok(None) => warn!("No persisted record for FIR {}", request.fir),
        Err(e) => warn!("Record lookup failed for FIR {}: {}", request.fir, e),
    }

    Json(serde_json::json!({
        "message": "file generated",
        "filePath": target,
    }))
    .into_response()
}

/// Extract and containment-check the local path behind a download-proxy URL.
fn image_path_from_url(reference: &str, working_dir: &Path) -> Option<PathBuf> {
    let url = if reference.starts_with("http://") || reference.starts_with("https://") {
        url::Url::parse(reference).ok()?
    } else {
        url::Url::parse("http://localhost").ok()?.join(reference).ok()?
    };
    let file = url
        .query_pairs()
        .find(|(key, _)| key == "file")
        .map(|(_, value)| value.into_owned())?;
    resolve_in_dir(working_dir, &file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_checks_the_file_parameter() {
        let working = Path::new("/data/working");

        let url = "/api/download?file=%2Fdata%2Fworking%2Fimages%2Fpage_1.jpg";
        assert_eq!(
            image_path_from_url(url, working),
            Some(PathBuf::from("/data/working/images/page_1.jpg"))
        );

        // Outside the working tree
        let url = "/api/download?file=%2Fetc%2Fpasswd";
        assert_eq!(image_path_from_url(url, working), None);

        // No file parameter at all
        assert_eq!(image_path_from_url("/api/download", working), None);
    }
}
