//! HTTP request handlers for the web server.

mod download;
mod generate;
mod helpers;
mod images;
mod process;
mod records;
mod results;
mod sync;

// Re-export handlers for use by the router
pub use download::download_file;
pub use generate::generate_file;
pub use images::list_working_images;
pub use process::process_file;
pub use records::{
    delete_record, get_record, list_records, record_file_url, update_record_status,
};
pub use results::{raw_results, working_results};
pub use sync::sync_store;

use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}
