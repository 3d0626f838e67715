//! Progress events and the classifier log-line grammar.
//!
//! The classifier reports progress as free-text Italian lines on stdout.
//! Its phrasing is the de facto protocol: each of six known phrases maps to
//! a status token, two of them with a page number extracted by regex. Lines
//! matching nothing are dropped without an event.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Status tokens carried by [`ProgressEvent::status`].
pub mod status {
    pub const STARTING: &str = "starting";
    pub const PDF_CONVERSION: &str = "pdf_conversion";
    pub const PDF_CONVERTED: &str = "pdf_converted";
    pub const PAGE_SAVED: &str = "page_saved";
    pub const PAGE_ANALYSIS: &str = "page_analysis";
    pub const FIR_CORRECTION: &str = "fir_correction";
    pub const CLASSIFIER_COMPLETE: &str = "classifier_complete";
    pub const RECORD_SAVED: &str = "record_saved";
    pub const COMPLETED: &str = "completed";
    pub const ERROR: &str = "error";
}

/// One progress event, serialized as a single NDJSON object on the
/// streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: String,
    #[serde(rename = "currentPage", skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(rename = "totalPages", skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
}

impl ProgressEvent {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            current_page: None,
            total_pages: None,
            error: None,
            fir: None,
            results: None,
        }
    }

    /// Synthetic first event, emitted before any subprocess output so the
    /// caller never observes a silent gap.
    pub fn starting() -> Self {
        Self {
            current_page: Some(0),
            total_pages: Some(0),
            ..Self::new(status::STARTING)
        }
    }

    /// Advisory or terminal error. Advisory errors (stderr lines) do not
    /// close the stream; only the pipeline decides what is terminal.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(status::ERROR)
        }
    }

    /// One record inserted into the store.
    pub fn record_saved(fir: &str, results: serde_json::Value) -> Self {
        Self {
            fir: Some(fir.to_string()),
            results: Some(results),
            ..Self::new(status::RECORD_SAVED)
        }
    }

    /// Terminal success event carrying the working manifest.
    pub fn completed(results: serde_json::Value) -> Self {
        Self {
            results: Some(results),
            ..Self::new(status::COMPLETED)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == status::COMPLETED
    }
}

static TOTAL_PAGES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Numero pagine: (\d+)").unwrap());
static PAGE_SAVED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Pagina (\d+)").unwrap());
static PAGE_ANALYSIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"page_(\d+)\.jpg").unwrap());

fn capture_u32(re: &Regex, line: &str) -> Option<u32> {
    re.captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Classify one trimmed, non-empty stdout line. Returns `None` for lines
/// outside the known phrase family.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    if line.contains("Tentativo di conversione PDF") {
        return Some(ProgressEvent::new(status::PDF_CONVERSION));
    }
    if line.contains("Conversione PDF riuscita") {
        return Some(ProgressEvent {
            total_pages: capture_u32(&TOTAL_PAGES_RE, line),
            ..ProgressEvent::new(status::PDF_CONVERTED)
        });
    }
    if line.contains("Pagina") && line.contains("salvata in:") {
        return Some(ProgressEvent {
            current_page: capture_u32(&PAGE_SAVED_RE, line),
            ..ProgressEvent::new(status::PAGE_SAVED)
        });
    }
    if line.contains("Analisi di:") {
        return Some(ProgressEvent {
            current_page: capture_u32(&PAGE_ANALYSIS_RE, line),
            ..ProgressEvent::new(status::PAGE_ANALYSIS)
        });
    }
    if line.contains("Correzione FIR:") {
        return Some(ProgressEvent::new(status::FIR_CORRECTION));
    }
    if line.contains("ELABORAZIONE COMPLETATA") {
        return Some(ProgressEvent::new(status::CLASSIFIER_COMPLETE));
    }
    None
}
