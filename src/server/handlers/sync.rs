//! Manual push of the working manifest to the hosted store via the
//! external upload script.

use std::process::Stdio;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::process::Command;
use tracing::{error, info};

use super::super::AppState;
use super::helpers::error_response;

/// `GET /api/sync` - run the configured upload script with the working
/// manifest path as its final argument and report the captured output.
pub async fn sync_store(State(state): State<AppState>) -> Response {
    let Some((program, leading_args)) = state.settings.upload_command.split_first() else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upload command is not configured",
        );
    };

    let manifest_path = state.settings.working_manifest_path();
    let output = Command::new(program)
        .args(leading_args)
        .arg(&manifest_path)
        .current_dir(&state.settings.classifier_workspace)
        .env("PYTHONUNBUFFERED", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            error!("Failed to run upload script '{}': {}", program, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": format!("failed to start upload script: {}", e),
                })),
            )
                .into_response();
        }
    };

    if output.status.success() {
        info!("Upload script completed");
        Json(serde_json::json!({
            "success": true,
            "message": "store sync completed",
            "stdout": String::from_utf8_lossy(&output.stdout),
        }))
        .into_response()
    } else {
        error!("Upload script exited with {}", output.status);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "success": false,
                "error": "upload script failed",
                "stderr": String::from_utf8_lossy(&output.stderr),
            })),
        )
            .into_response()
    }
}
