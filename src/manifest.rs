//! Classifier results manifest and its single-writer store.
//!
//! The classifier writes `risultati.json` into its own workspace; the
//! reconciler rewrites its paths and persists the result as
//! `risultati-working.json` inside the working area. All later mutations
//! (manual document regeneration) go through [`ManifestStore`], which
//! serializes read-modify-write cycles behind one async mutex.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Mapping from FIR number to document-type label to file path.
///
/// Label keys stay as strings here: the classifier may emit categories the
/// record schema does not recognize, and those entries must survive the
/// manifest round-trip even when record insertion skips them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub percorsi_file: BTreeMap<String, BTreeMap<String, String>>,
}

impl Manifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Rewrite every file path to `<output_dir>/<basename>`.
    pub fn rewrite_paths(&mut self, output_dir: &Path) {
        for files in self.percorsi_file.values_mut() {
            for path in files.values_mut() {
                let basename = Path::new(path.as_str())
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.clone());
                *path = output_dir.join(basename).to_string_lossy().into_owned();
            }
        }
    }

    /// Look up the path recorded for one `[fir][label]` entry.
    pub fn file_path(&self, fir: &str, label: &str) -> Option<&String> {
        self.percorsi_file.get(fir).and_then(|files| files.get(label))
    }
}

/// Owns the working manifest file. One instance per working directory;
/// the mutex makes each load-mutate-save cycle atomic with respect to
/// other writers in this process.
pub struct ManifestStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ManifestStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the working manifest; a missing file reads as an empty manifest.
    pub async fn load(&self) -> Result<Manifest, ManifestError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Manifest::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the whole manifest on disk.
    pub async fn replace(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        let _guard = self.lock.lock().await;
        self.write(manifest).await
    }

    /// Set one `[fir][label]` entry and persist. Returns the previous path
    /// for that entry, if any.
    pub async fn update_entry(
        &self,
        fir: &str,
        label: &str,
        path: &str,
    ) -> Result<Option<String>, ManifestError> {
        let _guard = self.lock.lock().await;
        let mut manifest = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Manifest::from_json(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
            Err(e) => return Err(e.into()),
        };

        let files = manifest.percorsi_file.entry(fir.to_string()).or_default();
        let old = files.insert(label.to_string(), path.to_string());
        self.write(&manifest).await?;
        Ok(old)
    }

    async fn write(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(manifest)?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        let json = r#"{
            "percorsi_file": {
                "FIR-100": {
                    "Formulario": "/opt/classifier/output/FIR-100_Formulario.pdf",
                    "Scontrino del peso": "/opt/classifier/output/FIR-100_peso.pdf"
                }
            }
        }"#;
        Manifest::from_json(json).unwrap()
    }

    #[test]
    fn rewrite_points_every_path_at_output_dir() {
        let mut manifest = sample();
        manifest.rewrite_paths(Path::new("/data/working/output"));

        for files in manifest.percorsi_file.values() {
            for path in files.values() {
                assert!(path.starts_with("/data/working/output/"), "path: {}", path);
            }
        }
        assert_eq!(
            manifest.file_path("FIR-100", "Formulario").unwrap(),
            "/data/working/output/FIR-100_Formulario.pdf"
        );
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("risultati-working.json"));
        let manifest = store.load().await.unwrap();
        assert!(manifest.percorsi_file.is_empty());
    }

    #[tokio::test]
    async fn update_entry_persists_and_returns_old_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("risultati-working.json"));

        let old = store
            .update_entry("X1", "Formulario", "/w/output/a.pdf")
            .await
            .unwrap();
        assert_eq!(old, None);

        let old = store
            .update_entry("X1", "Formulario", "/w/output/b.pdf")
            .await
            .unwrap();
        assert_eq!(old.as_deref(), Some("/w/output/a.pdf"));

        let manifest = store.load().await.unwrap();
        assert_eq!(
            manifest.file_path("X1", "Formulario").unwrap(),
            "/w/output/b.pdf"
        );
    }

    #[tokio::test]
    async fn unknown_labels_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("risultati-working.json"));

        let mut manifest = Manifest::default();
        manifest
            .percorsi_file
            .entry("FIR-9".to_string())
            .or_default()
            .insert("Documento ignoto".to_string(), "/w/output/x.pdf".to_string());
        store.replace(&manifest).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, manifest);
    }
}
