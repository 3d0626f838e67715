//! Classifier subprocess launcher.
//!
//! Spawns the configured classifier with the uploaded PDF path as its final
//! argument, translates its stdout into structured progress events, forwards
//! stderr lines as advisory errors, and on success hands off to the
//! reconciler and record insertion. The event channel is closed exactly once,
//! when this function returns and the last sender drops.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::Sender;
use futures::SinkExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::manifest::{Manifest, ManifestStore};
use crate::models::{DocumentLabel, FormularioRecord};
use crate::store::RecordStore;

use super::progress::{parse_progress_line, ProgressEvent};
use super::reconcile;

/// Bounded capacity of the progress channel. Events are flushed to the
/// transport as they are produced; the bound applies backpressure to the
/// subprocess readers instead of buffering without limit.
pub const CHANNEL_CAPACITY: usize = 16;

/// Everything one pipeline run needs, cheap to clone per request.
#[derive(Clone)]
pub struct PipelineContext {
    pub settings: Arc<Settings>,
    pub manifest: Arc<ManifestStore>,
    pub records: Arc<dyn RecordStore>,
    /// Admission control over classifier subprocess spawns.
    pub jobs: Arc<Semaphore>,
}

/// Send an event, logging (not failing) when the receiver is gone. A
/// disconnected client does not cancel the pipeline.
async fn emit(tx: &mut Sender<ProgressEvent>, event: ProgressEvent) {
    if let Err(e) = tx.send(event).await {
        debug!("progress receiver dropped: {}", e);
    }
}

/// Run the full pipeline for one uploaded PDF, emitting progress events on
/// `tx`. Always emits a terminal event (`completed` or `error`) last.
pub async fn run_pipeline(ctx: PipelineContext, pdf_path: PathBuf, mut tx: Sender<ProgressEvent>) {
    let _permit = match ctx.jobs.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            emit(&mut tx, ProgressEvent::error("job queue is closed")).await;
            return;
        }
    };

    let job_id = uuid::Uuid::new_v4().to_string();
    info!("Processing {} (job {})", pdf_path.display(), job_id);

    // Synthetic first event: the caller never sees a silent gap while the
    // interpreter starts up.
    emit(&mut tx, ProgressEvent::starting()).await;

    let Some((program, leading_args)) = ctx.settings.classifier_command.split_first() else {
        emit(&mut tx, ProgressEvent::error("classifier command is not configured")).await;
        return;
    };

    let mut command = Command::new(program);
    command
        .args(leading_args)
        .arg(&pdf_path)
        .current_dir(&ctx.settings.classifier_workspace)
        .env("PYTHONUNBUFFERED", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!("Failed to spawn classifier '{}': {}", program, e);
            emit(
                &mut tx,
                ProgressEvent::error(format!("failed to start classifier: {}", e)),
            )
            .await;
            return;
        }
    };

    let stdout_task = child.stdout.take().map(|stdout| {
        let mut tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(event) = parse_progress_line(line) {
                    emit(&mut tx, event).await;
                }
            }
        })
    });

    // Every non-empty stderr line is an advisory error event; it never
    // terminates the stream on its own.
    let stderr_task = child.stderr.take().map(|stderr| {
        let mut tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                warn!("classifier stderr: {}", line);
                emit(&mut tx, ProgressEvent::error(line)).await;
            }
        })
    });

    let join_readers = |stdout_task, stderr_task| async move {
        if let Some(task) = stdout_task {
            let _: Result<_, _> = task.await;
        }
        if let Some(task) = stderr_task {
            let _: Result<_, _> = task.await;
        }
    };

    let exit = match ctx.settings.job_timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), child.wait()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Classifier timed out after {}s, killing (job {})", secs, job_id);
                let _ = child.kill().await;
                join_readers(stdout_task, stderr_task).await;
                emit(
                    &mut tx,
                    ProgressEvent::error(format!("classifier timed out after {}s", secs)),
                )
                .await;
                return;
            }
        },
        None => child.wait().await,
    };

    // Flush any events still in flight before the terminal event.
    join_readers(stdout_task, stderr_task).await;

    let status = match exit {
        Ok(status) => status,
        Err(e) => {
            error!("Failed waiting for classifier: {}", e);
            emit(
                &mut tx,
                ProgressEvent::error(format!("failed waiting for classifier: {}", e)),
            )
            .await;
            return;
        }
    };

    if !status.success() {
        info!("Classifier exited with {} (job {})", status, job_id);
        emit(
            &mut tx,
            ProgressEvent::error(format!("classifier exited with {}", status)),
        )
        .await;
        return;
    }

    match reconcile::reconcile(&ctx.settings, &ctx.manifest, &job_id, &pdf_path).await {
        Ok(manifest) => {
            save_records(&ctx, &manifest, &mut tx).await;
            match serde_json::to_value(&manifest) {
                Ok(results) => emit(&mut tx, ProgressEvent::completed(results)).await,
                Err(e) => {
                    error!("Failed to serialize working manifest: {}", e);
                    emit(
                        &mut tx,
                        ProgressEvent::error("failed to serialize processing results"),
                    )
                    .await;
                }
            }
        }
        Err(e) => {
            error!("Reconciliation failed (job {}): {}", job_id, e);
            emit(
                &mut tx,
                ProgressEvent::error(format!("failed to reconcile classifier artifacts: {}", e)),
            )
            .await;
        }
    }
}

/// Insert one record per FIR whose labels are all recognized. A failed
/// insert is reported and skipped; later FIRs still get processed.
async fn save_records(ctx: &PipelineContext, manifest: &Manifest, tx: &mut Sender<ProgressEvent>) {
    for (fir, files) in &manifest.percorsi_file {
        let mut typed: BTreeMap<DocumentLabel, String> = BTreeMap::new();
        let mut recognized = true;
        for (label, path) in files {
            match DocumentLabel::parse(label) {
                Some(label) => {
                    typed.insert(label, path.clone());
                }
                None => {
                    warn!("Skipping FIR {}: unrecognized document label '{}'", fir, label);
                    recognized = false;
                    break;
                }
            }
        }
        if !recognized {
            continue;
        }

        let record = FormularioRecord::from_scan(fir.clone(), typed);
        match ctx.records.insert(&record).await {
            Ok(()) => {
                info!("Saved record {} for FIR {}", record.id, fir);
                let files = serde_json::to_value(&record.files).unwrap_or_default();
                emit(tx, ProgressEvent::record_saved(fir, files)).await;
            }
            Err(e) => {
                error!("Failed to insert record for FIR {}: {}", fir, e);
                emit(
                    tx,
                    ProgressEvent::error(format!("failed to save record for FIR {}", fir)),
                )
                .await;
            }
        }
    }
}
