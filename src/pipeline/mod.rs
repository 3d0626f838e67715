//! The upload-and-processing pipeline.
//!
//! One upload drives one classifier subprocess. Stdout lines are parsed
//! into [`ProgressEvent`]s and relayed to the caller in emission order;
//! on a zero exit code the reconciler publishes the classifier's artifacts
//! into the working area and one record per recognized FIR is inserted
//! into the record store.

mod launcher;
mod progress;
mod reconcile;

pub use launcher::{run_pipeline, PipelineContext, CHANNEL_CAPACITY};
pub use progress::{parse_progress_line, status, ProgressEvent};
pub use reconcile::reconcile;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Manifest(#[from] crate::manifest::ManifestError),
}
