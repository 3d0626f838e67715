//! Artifact reconciliation: publish classifier output into the working area.
//!
//! Runs only after the classifier exits with code 0. Artifacts are first
//! copied into a per-job staging directory, then swapped into the working
//! area by rename, so a concurrent reader of the working directory never
//! observes a half-copied tree. Re-running with identical sources yields an
//! identical working file set (full replace, not a merge).

use std::fs;
use std::io;
use std::path::Path;

use crate::config::Settings;
use crate::manifest::{Manifest, ManifestStore};

use super::PipelineError;

/// Publish the classifier's `images/` and `output/` directories, rewrite
/// the results manifest, and archive the uploaded PDF. Returns the working
/// manifest as persisted.
pub async fn reconcile(
    settings: &Settings,
    manifest_store: &ManifestStore,
    job_id: &str,
    uploaded_pdf: &Path,
) -> Result<Manifest, PipelineError> {
    fs::create_dir_all(settings.working_dir())?;
    fs::create_dir_all(settings.working_output_dir())?;
    fs::create_dir_all(settings.original_processed_dir())?;

    let staging = settings.staging_dir().join(job_id);
    let staged_images = staging.join("images");
    let staged_output = staging.join("output");

    copy_dir_all(&settings.workspace_images_dir(), &staged_images)?;
    copy_dir_all(&settings.workspace_output_dir(), &staged_output)?;

    publish_dir(&staged_images, &settings.working_images_dir(), job_id)?;
    publish_dir(&staged_output, &settings.working_output_dir(), job_id)?;

    let text = fs::read_to_string(settings.workspace_manifest_path())?;
    let mut manifest = Manifest::from_json(&text)?;
    manifest.rewrite_paths(&settings.working_output_dir());
    manifest_store.replace(&manifest).await?;

    let filename = uploaded_pdf
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "upload.pdf".into());
    fs::copy(
        uploaded_pdf,
        settings.original_processed_dir().join(filename),
    )?;

    if let Err(e) = fs::remove_dir_all(&staging) {
        tracing::warn!("Failed to clean staging dir {}: {}", staging.display(), e);
    }

    Ok(manifest)
}

/// Recursively copy a directory tree.
fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Swap a staged directory into place: rename the old copy aside, rename
/// the staged copy in, then delete the old copy.
fn publish_dir(staged: &Path, target: &Path, job_id: &str) -> io::Result<()> {
    let retired = retired_path(target, job_id)?;

    if target.exists() {
        fs::rename(target, &retired)?;
    }
    if let Err(e) = fs::rename(staged, target) {
        // Put the previous copy back before failing
        if retired.exists() {
            let _ = fs::rename(&retired, target);
        }
        return Err(e);
    }
    if retired.exists() {
        fs::remove_dir_all(&retired)?;
    }
    Ok(())
}

fn retired_path(target: &Path, job_id: &str) -> io::Result<std::path::PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no name"))?;
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;
    Ok(parent.join(format!("{}.old-{}", name.to_string_lossy(), job_id)))
}
