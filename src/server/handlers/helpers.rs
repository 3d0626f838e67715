//! Shared helper functions for request handlers.

use std::path::{Component, Path, PathBuf};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// JSON error body with the given status.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Lexically normalize a path: drop `.`, resolve `..` against the
/// components already seen. No filesystem access, no symlink resolution.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve a raw file parameter against `base`, accepting only paths that
/// stay inside `base` after normalization. Relative inputs are joined to
/// `base` first.
pub(crate) fn resolve_in_dir(base: &Path, raw: &str) -> Option<PathBuf> {
    let candidate = Path::new(raw);
    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    };
    let normalized = normalize(&absolute);
    if normalized.starts_with(normalize(base)) {
        Some(normalized)
    } else {
        None
    }
}

/// Content type for the download proxy, derived from the file extension.
pub(crate) fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Download-proxy URL for a local file path.
pub(crate) fn download_url(path: &Path) -> String {
    format!(
        "/api/download?file={}",
        urlencoding::encode(&path.to_string_lossy())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_rejected() {
        let base = Path::new("/data/working");
        assert_eq!(resolve_in_dir(base, "../../etc/passwd"), None);
        assert_eq!(resolve_in_dir(base, "/data/working/../secrets"), None);
        assert_eq!(resolve_in_dir(base, "/etc/passwd"), None);
    }

    #[test]
    fn contained_paths_are_accepted() {
        let base = Path::new("/data/working");
        assert_eq!(
            resolve_in_dir(base, "/data/working/images/page_1.jpg"),
            Some(PathBuf::from("/data/working/images/page_1.jpg"))
        );
        assert_eq!(
            resolve_in_dir(base, "images/page_1.jpg"),
            Some(PathBuf::from("/data/working/images/page_1.jpg"))
        );
        // `..` that stays inside the tree is fine
        assert_eq!(
            resolve_in_dir(base, "/data/working/output/../images/a.png"),
            Some(PathBuf::from("/data/working/images/a.png"))
        );
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for(Path::new("a.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.png")), "image/png");
        assert_eq!(content_type_for(Path::new("a.tiff")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }
}
