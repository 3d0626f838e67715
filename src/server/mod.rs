//! Web server for the formulario dashboard backend.
//!
//! Serves the upload-and-processing pipeline, the working manifest, the
//! path-checked download proxy, and the record endpoints.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::Settings;
use crate::manifest::ManifestStore;
use crate::pipeline::PipelineContext;
use crate::store::{MemoryRecordStore, RecordStore, RestRecordStore};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub manifest: Arc<ManifestStore>,
    pub records: Arc<dyn RecordStore>,
    /// Admission control over classifier subprocess spawns.
    pub jobs: Arc<Semaphore>,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let records: Arc<dyn RecordStore> = match (&settings.store_url, &settings.store_key) {
            (Some(url), Some(key)) => {
                Arc::new(RestRecordStore::new(url, key, &settings.store_bucket))
            }
            _ => {
                tracing::warn!("No hosted store configured; records are kept in memory");
                Arc::new(MemoryRecordStore::new())
            }
        };

        Self {
            manifest: Arc::new(ManifestStore::new(settings.working_manifest_path())),
            jobs: Arc::new(Semaphore::new(settings.max_concurrent_jobs)),
            settings: Arc::new(settings.clone()),
            records,
        }
    }

    pub fn pipeline_context(&self) -> PipelineContext {
        PipelineContext {
            settings: self.settings.clone(),
            manifest: self.manifest.clone(),
            records: self.records.clone(),
            jobs: self.jobs.clone(),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::collections::BTreeMap;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::models::{DocumentLabel, FormularioRecord};

    fn setup_test_app() -> (axum::Router, AppState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().to_path_buf());
        settings.ensure_directories().unwrap();
        std::fs::create_dir_all(settings.working_images_dir()).unwrap();

        let state = AppState::new(&settings);
        let app = create_router(state.clone());
        (app, state, dir)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn write_png(path: &std::path::Path) {
        image::RgbImage::from_pixel(30, 40, image::Rgb([0, 0, 255]))
            .save(path)
            .unwrap();
    }

    fn write_jpg(path: &std::path::Path) {
        image::RgbImage::from_pixel(40, 30, image::Rgb([255, 0, 0]))
            .save(path)
            .unwrap();
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn download_rejects_path_traversal() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(
                Request::get("/api/download?file=..%2F..%2Fetc%2Fpasswd")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn download_rejects_absolute_path_outside_working_dir() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(
                Request::get("/api/download?file=%2Fetc%2Fpasswd")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn download_requires_file_parameter() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(Request::get("/api/download").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn download_serves_contained_file_with_content_type() {
        let (app, state, _dir) = setup_test_app();
        let path = state.settings.working_images_dir().join("page_1.png");
        write_png(&path);

        let uri = format!(
            "/api/download?file={}",
            urlencoding::encode(&path.to_string_lossy())
        );
        let response = app
            .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
    }

    #[tokio::test]
    async fn images_endpoint_lists_download_urls() {
        let (app, state, _dir) = setup_test_app();
        write_png(&state.settings.working_images_dir().join("page_2.png"));
        write_jpg(&state.settings.working_images_dir().join("page_1.jpg"));

        let response = app
            .oneshot(Request::get("/api/images").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let urls = body_json(response).await;
        let urls = urls.as_array().unwrap();
        assert_eq!(urls.len(), 2);
        for url in urls {
            assert!(url.as_str().unwrap().starts_with("/api/download?file="));
        }
        // Sorted by filename
        assert!(urls[0].as_str().unwrap().contains("page_1"));
    }

    #[tokio::test]
    async fn working_results_reads_the_working_manifest() {
        let (app, state, _dir) = setup_test_app();
        state
            .manifest
            .update_entry("F1", "Formulario", "/w/output/f1.pdf")
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::get("/api/results/working")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["percorsi_file"]["F1"]["Formulario"], "/w/output/f1.pdf");
    }

    #[tokio::test]
    async fn generate_file_rejects_unknown_document_type() {
        let (app, _state, _dir) = setup_test_app();
        let body = serde_json::json!({
            "fir": "X1",
            "documentType": "Bolla di consegna",
            "selectedImages": ["/api/download?file=x"],
        });
        let response = app
            .oneshot(
                Request::post("/api/generate-file")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_file_rejects_empty_selection() {
        let (app, _state, _dir) = setup_test_app();
        let body = serde_json::json!({
            "fir": "X1",
            "documentType": "Formulario",
            "selectedImages": [],
        });
        let response = app
            .oneshot(
                Request::post("/api/generate-file")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_file_composes_pdf_and_updates_manifest_and_record() {
        let (app, state, _dir) = setup_test_app();

        let jpg = state.settings.working_images_dir().join("page_1.jpg");
        let png = state.settings.working_images_dir().join("page_2.png");
        write_jpg(&jpg);
        write_png(&png);

        // Seed a record so the change history gets its entry
        let record = FormularioRecord::from_scan("X1".to_string(), BTreeMap::new());
        let record_id = record.id.clone();
        state.records.insert(&record).await.unwrap();

        let body = serde_json::json!({
            "fir": "X1",
            "documentType": "Formulario",
            "selectedImages": [
                format!("/api/download?file={}", urlencoding::encode(&jpg.to_string_lossy())),
                format!("/api/download?file={}", urlencoding::encode(&png.to_string_lossy())),
            ],
        });
        let response = app
            .oneshot(
                Request::post("/api/generate-file")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let file_path = json["filePath"].as_str().unwrap().to_string();
        assert!(file_path.ends_with(".pdf"));
        assert!(std::path::Path::new(&file_path).exists());

        // Manifest entry points at the generated file
        let manifest = state.manifest.load().await.unwrap();
        assert_eq!(manifest.file_path("X1", "Formulario").unwrap(), &file_path);

        // Record gained exactly one document_generation entry
        let record = state.records.get(&record_id).await.unwrap().unwrap();
        assert_eq!(record.change_history.len(), 2);
        assert_eq!(
            record.files.get(&DocumentLabel::Formulario).unwrap(),
            &file_path
        );

        // Both pages made it into the document
        let bytes = std::fs::read(&file_path).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn generate_file_skips_unsupported_images() {
        let (app, state, _dir) = setup_test_app();

        let jpg = state.settings.working_images_dir().join("page_1.jpg");
        write_jpg(&jpg);
        let bmp = state.settings.working_images_dir().join("page_2.bmp");
        std::fs::write(&bmp, b"BM not really").unwrap();

        let body = serde_json::json!({
            "fir": "X2",
            "documentType": "Scontrino del peso",
            "selectedImages": [
                format!("/api/download?file={}", urlencoding::encode(&jpg.to_string_lossy())),
                format!("/api/download?file={}", urlencoding::encode(&bmp.to_string_lossy())),
            ],
        });
        let response = app
            .oneshot(
                Request::post("/api/generate-file")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let file_path = json["filePath"].as_str().unwrap();
        let bytes = std::fs::read(file_path).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[tokio::test]
    async fn record_endpoints_round_trip() {
        let (app, state, _dir) = setup_test_app();

        let mut files = BTreeMap::new();
        files.insert(DocumentLabel::Formulario, "/w/output/f.pdf".to_string());
        let record = FormularioRecord::from_scan("F7".to_string(), files);
        let id = record.id.clone();
        state.records.insert(&record).await.unwrap();

        // List
        let response = app
            .clone()
            .oneshot(Request::get("/api/records").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        // Status update appends one change entry
        let response = app
            .clone()
            .oneshot(
                Request::patch(format!("/api/records/{}/status", id))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"status":"archived"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["metadata"]["status"], "archived");
        assert_eq!(json["change_history"].as_array().unwrap().len(), 2);

        // Signed URL for an existing file label
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/records/{}/files/Formulario/url", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["url"].as_str().unwrap().contains("f.pdf"));

        // Hard delete
        let response = app
            .clone()
            .oneshot(
                Request::delete(format!("/api/records/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::get(format!("/api/records/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn process_file_requires_multipart() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(
                Request::post("/api/process-file")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn process_file_requires_the_file_field() {
        let (app, _state, _dir) = setup_test_app();
        let boundary = "X-FIRDESK-BOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhello\r\n--{b}--\r\n",
            b = boundary
        );
        let response = app
            .oneshot(
                Request::post("/api/process-file")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
