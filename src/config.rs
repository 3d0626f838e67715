//! Configuration management for firdesk.
//!
//! Two layers, kept separate on purpose:
//! - [`Settings`] is the fully-resolved runtime view (absolute paths,
//!   defaults applied, env overrides folded in).
//! - [`Config`] is the on-disk file format (everything optional), loaded
//!   from `firdesk.{toml,yaml,yml,json}` by extension.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Subdirectory of the data dir where uploaded PDFs land.
pub const UPLOADS_SUBDIR: &str = "uploads";
/// Subdirectory of the data dir holding the published working area.
pub const WORKING_SUBDIR: &str = "working";
/// Subdirectory of the data dir used for per-job staging before publish.
pub const STAGING_SUBDIR: &str = "staging";
/// Working manifest filename (path-rewritten copy of the classifier output).
pub const WORKING_MANIFEST_FILENAME: &str = "risultati-working.json";
/// Manifest filename the classifier writes into its own workspace.
pub const WORKSPACE_MANIFEST_FILENAME: &str = "risultati.json";

/// Default cap on concurrently running classifier processes.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Directory the external classifier runs in and writes its
    /// `images/`, `output/` and `risultati.json` artifacts to.
    pub classifier_workspace: PathBuf,
    /// Classifier invocation: program plus leading arguments. The uploaded
    /// PDF path is appended as the final argument.
    pub classifier_command: Vec<String>,
    /// Upload-script invocation: program plus leading arguments. The working
    /// manifest path is appended as the final argument.
    pub upload_command: Vec<String>,
    /// Maximum number of classifier subprocesses running at once.
    pub max_concurrent_jobs: usize,
    /// Optional wall-clock limit for one classifier run, in seconds.
    /// `None` preserves the unbounded wait.
    pub job_timeout_secs: Option<u64>,
    /// Base URL of the hosted record store (None = in-memory store).
    pub store_url: Option<String>,
    /// API key for the hosted record store.
    pub store_key: Option<String>,
    /// Blob-store bucket holding document files.
    pub store_bucket: String,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to the platform data dir, falling back to home, then cwd
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("firdesk");

        Self {
            classifier_workspace: data_dir.join("classifier"),
            data_dir,
            classifier_command: vec![
                "python3".to_string(),
                "-u".to_string(),
                "classificatore.py".to_string(),
            ],
            upload_command: vec!["python3".to_string(), "upload_records.py".to_string()],
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            job_timeout_secs: None,
            store_url: None,
            store_key: None,
            store_bucket: "formulari".to_string(),
        }
    }
}

impl Settings {
    /// Create settings rooted at a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            classifier_workspace: data_dir.join("classifier"),
            data_dir,
            ..Default::default()
        }
    }

    /// Directory uploaded PDFs are written into.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOADS_SUBDIR)
    }

    /// Published working area.
    pub fn working_dir(&self) -> PathBuf {
        self.data_dir.join(WORKING_SUBDIR)
    }

    /// Per-job staging area used during reconciliation.
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join(STAGING_SUBDIR)
    }

    /// Working copy of the classifier's `output` directory.
    pub fn working_output_dir(&self) -> PathBuf {
        self.working_dir().join("output")
    }

    /// Working copy of the classifier's `images` directory.
    pub fn working_images_dir(&self) -> PathBuf {
        self.working_dir().join("images")
    }

    /// Directory holding the original uploaded PDFs after processing.
    pub fn original_processed_dir(&self) -> PathBuf {
        self.working_dir().join("original-processed-file")
    }

    /// Path of the path-rewritten working manifest.
    pub fn working_manifest_path(&self) -> PathBuf {
        self.working_dir().join(WORKING_MANIFEST_FILENAME)
    }

    /// Path of the manifest the classifier writes in its own workspace.
    pub fn workspace_manifest_path(&self) -> PathBuf {
        self.classifier_workspace.join(WORKSPACE_MANIFEST_FILENAME)
    }

    /// `images` directory inside the classifier workspace.
    pub fn workspace_images_dir(&self) -> PathBuf {
        self.classifier_workspace.join("images")
    }

    /// `output` directory inside the classifier workspace.
    pub fn workspace_output_dir(&self) -> PathBuf {
        self.classifier_workspace.join("output")
    }

    /// Whether a hosted record store is configured.
    pub fn has_store(&self) -> bool {
        self.store_url.is_some() && self.store_key.is_some()
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.uploads_dir(),
            self.working_dir(),
            self.working_output_dir(),
            self.staging_dir(),
            self.original_processed_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                )
            })?;
        }
        Ok(())
    }
}

/// Hosted record-store section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub key: Option<String>,
    pub bucket: Option<String>,
}

/// On-disk configuration file format. Every field is optional; absent
/// fields keep the [`Settings`] defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: Option<String>,
    pub classifier_workspace: Option<String>,
    pub classifier_command: Option<Vec<String>>,
    pub upload_command: Option<Vec<String>>,
    pub max_concurrent_jobs: Option<usize>,
    pub job_timeout_secs: Option<u64>,
    pub store: StoreConfig,

    /// Path the config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// Supports TOML, YAML, and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Discover a config file: `firdesk.{toml,yaml,yml,json}` in the current
    /// directory, then in the platform config dir under `firdesk/`.
    pub async fn load() -> Self {
        let mut candidates = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            for name in CONFIG_FILENAMES {
                candidates.push(cwd.join(name));
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            for name in CONFIG_FILENAMES {
                candidates.push(config_dir.join("firdesk").join(name));
            }
        }

        for candidate in candidates {
            if candidate.exists() {
                match Self::load_from_path(&candidate).await {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", candidate.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Ignoring config {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        Self::default()
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically the config
    /// file's directory, or CWD when loaded without a file).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.classifier_workspace = settings.data_dir.join("classifier");
        }
        if let Some(ref workspace) = self.classifier_workspace {
            settings.classifier_workspace = self.resolve_path(workspace, base_dir);
        }
        if let Some(ref command) = self.classifier_command {
            settings.classifier_command = command.clone();
        }
        if let Some(ref command) = self.upload_command {
            settings.upload_command = command.clone();
        }
        if let Some(jobs) = self.max_concurrent_jobs {
            settings.max_concurrent_jobs = jobs.max(1);
        }
        if let Some(timeout) = self.job_timeout_secs {
            settings.job_timeout_secs = Some(timeout);
        }
        if let Some(ref url) = self.store.url {
            settings.store_url = Some(url.clone());
        }
        if let Some(ref key) = self.store.key {
            settings.store_key = Some(key.clone());
        }
        if let Some(ref bucket) = self.store.bucket {
            settings.store_bucket = bucket.clone();
        }
    }
}

const CONFIG_FILENAMES: &[&str] = &[
    "firdesk.toml",
    "firdesk.yaml",
    "firdesk.yml",
    "firdesk.json",
];

/// Options for loading settings.
#[derive(Debug, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory override from the CLI.
    pub data_dir: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = if let Some(ref path) = options.config_path {
        match Config::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config {}: {}", path.display(), e);
                Config::default()
            }
        }
    } else {
        Config::load().await
    };

    let mut settings = Settings::default();

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    config.apply_to_settings(&mut settings, &base_dir);

    // --data-dir override takes precedence over config
    if let Some(data_dir) = options.data_dir {
        settings.classifier_workspace = data_dir.join("classifier");
        settings.data_dir = data_dir;
        if let Some(ref workspace) = config.classifier_workspace {
            settings.classifier_workspace = config.resolve_path(workspace, &base_dir);
        }
    }

    // Environment variables take highest precedence
    if let Some(url) = env_nonempty("FIRDESK_STORE_URL") {
        settings.store_url = Some(url);
    }
    if let Some(key) = env_nonempty("FIRDESK_STORE_KEY") {
        settings.store_key = Some(key);
    }
    if let Some(bucket) = env_nonempty("FIRDESK_STORE_BUCKET") {
        settings.store_bucket = bucket;
    }
    if let Some(dir) = env_nonempty("FIRDESK_DATA_DIR") {
        let expanded = shellexpand::tilde(&dir).to_string();
        settings.data_dir = PathBuf::from(expanded);
    }

    (settings, config)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_hang_off_data_dir() {
        let settings = Settings::with_data_dir(PathBuf::from("/srv/firdesk"));
        assert_eq!(settings.uploads_dir(), PathBuf::from("/srv/firdesk/uploads"));
        assert_eq!(
            settings.working_manifest_path(),
            PathBuf::from("/srv/firdesk/working/risultati-working.json")
        );
        assert_eq!(
            settings.workspace_manifest_path(),
            PathBuf::from("/srv/firdesk/classifier/risultati.json")
        );
    }

    #[tokio::test]
    async fn toml_config_applies_to_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firdesk.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "data"
classifier_command = ["python3", "-u", "/opt/fir/classificatore.py"]
max_concurrent_jobs = 4
job_timeout_secs = 600

[store]
url = "https://example.supabase.co"
key = "secret"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path());

        assert_eq!(settings.data_dir, dir.path().join("data"));
        assert_eq!(settings.max_concurrent_jobs, 4);
        assert_eq!(settings.job_timeout_secs, Some(600));
        assert_eq!(settings.classifier_command[2], "/opt/fir/classificatore.py");
        assert!(settings.has_store());
    }

    #[tokio::test]
    async fn max_concurrent_jobs_is_clamped_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firdesk.json");
        std::fs::write(&path, r#"{"max_concurrent_jobs": 0}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path());
        assert_eq!(settings.max_concurrent_jobs, 1);
    }
}
