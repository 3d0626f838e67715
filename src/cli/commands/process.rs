//! Terminal pipeline runner.

use std::path::Path;

use console::style;
use futures::channel::mpsc;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::pipeline::{run_pipeline, status, ProgressEvent, CHANNEL_CAPACITY};
use crate::server::AppState;

/// Run the processing pipeline on one PDF from the terminal.
pub async fn cmd_process(settings: &Settings, file: &Path, json: bool) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }
    settings.ensure_directories()?;

    // Same wiring (store selection, manifest path) as the server
    let ctx = AppState::new(settings).pipeline_context();

    let (tx, mut rx) = mpsc::channel::<ProgressEvent>(CHANNEL_CAPACITY);
    let pipeline = tokio::spawn(run_pipeline(ctx, file.to_path_buf(), tx));

    let mut failure: Option<String> = None;
    let mut completed = false;

    if json {
        while let Some(event) = rx.next().await {
            println!("{}", serde_json::to_string(&event)?);
            track_outcome(&event, &mut completed, &mut failure);
        }
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        while let Some(event) = rx.next().await {
            if let Some(total) = event.total_pages {
                if total > 0 {
                    bar.set_length(total as u64);
                }
            }
            if let Some(page) = event.current_page {
                bar.set_position(page as u64);
            }
            match event.status.as_str() {
                status::ERROR => {
                    bar.println(format!(
                        "{} {}",
                        style("!").yellow(),
                        event.error.as_deref().unwrap_or("error")
                    ));
                }
                status::RECORD_SAVED => {
                    bar.println(format!(
                        "{} record saved for FIR {}",
                        style("✓").green(),
                        event.fir.as_deref().unwrap_or("?")
                    ));
                }
                other => bar.set_message(other.to_string()),
            }
            track_outcome(&event, &mut completed, &mut failure);
        }
        bar.finish_and_clear();
    }

    let _ = pipeline.await;

    if completed {
        println!(
            "{} Processing complete; results in {}",
            style("✓").green(),
            settings.working_manifest_path().display()
        );
        Ok(())
    } else {
        let reason = failure.unwrap_or_else(|| "pipeline ended without results".to_string());
        anyhow::bail!("processing failed: {}", reason)
    }
}

/// The last error before the stream closes is the terminal one.
fn track_outcome(event: &ProgressEvent, completed: &mut bool, failure: &mut Option<String>) {
    if event.is_terminal() {
        *completed = true;
    } else if event.status == status::ERROR {
        *failure = event.error.clone();
    }
}
