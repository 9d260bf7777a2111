//! Replay configuration file support.
//!
//! Configuration is read from TOML. Every field is optional so that a local
//! file can override only what it needs on top of the global one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_DATA_DIR: &str = "src/content/assets/data";
pub const DEFAULT_USERNAME: &str = "tfrere";
pub const DEFAULT_SHARED_SPACE: &str = "tfrere/loss-experiment";
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_PROGRESS_EVERY: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Loss files replayed when no `[[files]]` table is configured.
const DEFAULT_FILES: &[(&str, &str)] = &[
    ("attention_loss.csv", "attention-loss-comparison"),
    ("batch-size_loss.csv", "batch-size-loss-comparison"),
    ("doc-masking_loss.csv", "doc-masking-loss-comparison"),
    ("lr_loss.csv", "lr-loss-comparison"),
    ("nope_loss.csv", "nope-loss-comparison"),
    ("spike_loss.csv", "spike-loss-comparison"),
    ("tied-embeddings_loss.csv", "tied-embeddings-loss-comparison"),
    ("tp_debug_fix_loss.csv", "tp-debug-fix-loss-comparison"),
    ("wsd_loss.csv", "wsd-loss-comparison"),
];

/// Where replayed metrics are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Hosted Space, mirrored to the local store.
    #[default]
    Space,
    /// Local Trackio store only.
    Local,
    /// Nothing is written.
    DryRun,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "space" => Ok(Self::Space),
            "local" => Ok(Self::Local),
            "dry-run" | "dry_run" | "dryrun" => Ok(Self::DryRun),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown backend '{other}' (expected space, local or dry-run)"
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Space => "space",
            Self::Local => "local",
            Self::DryRun => "dry-run",
        })
    }
}

/// One loss file and the project it is replayed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMapping {
    pub file: String,
    /// Project name; derived from the file name when empty.
    #[serde(default)]
    pub project: String,
}

impl FileMapping {
    #[must_use]
    pub fn new(file: impl Into<String>, project: impl Into<String>) -> Self {
        Self { file: file.into(), project: project.into() }
    }

    /// The configured project, or the one derived from the file name.
    #[must_use]
    pub fn project_name(&self) -> String {
        if self.project.trim().is_empty() {
            crate::project::project_name_from_file(&self.file)
        } else {
            self.project.clone()
        }
    }
}

#[must_use]
pub fn default_file_mappings() -> Vec<FileMapping> {
    DEFAULT_FILES.iter().map(|(file, project)| FileMapping::new(*file, *project)).collect()
}

/// Replay configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Directory holding the loss CSV files.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Hub user owning the per-project Spaces.
    #[serde(default)]
    pub username: Option<String>,

    /// Space receiving every project in shared mode.
    #[serde(default)]
    pub shared_space: Option<String>,

    /// Hub API endpoint.
    #[serde(default)]
    pub hub_endpoint: Option<String>,

    #[serde(default)]
    pub backend: Option<BackendKind>,

    /// Emit a progress line every N logged points.
    #[serde(default)]
    pub progress_every: Option<usize>,

    /// Entries sent to a hosted Space per request.
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Root of the local Trackio store.
    #[serde(default)]
    pub trackio_dir: Option<PathBuf>,

    #[serde(default)]
    pub files: Vec<FileMapping>,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl ReplayConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".lossreplay").join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".lossreplayrc")
    }

    /// Discover and load configuration files.
    ///
    /// Loads the global config (`~/.lossreplay/config.toml`), then the local
    /// one (`./.lossreplayrc`) on top of it. Unreadable files are logged and
    /// ignored.
    pub fn discover_and_load() -> Self {
        let mut config = Self::default();

        for path in [Self::default_global_path(), Self::default_local_path()] {
            match Self::load_from_file(&path) {
                Ok(found) => {
                    tracing::debug!(path = %path.display(), "loaded configuration");
                    config.merge(&found);
                }
                Err(ConfigError::NotFound(_)) => {}
                Err(e) => tracing::warn!("Ignoring configuration: {}", e),
            }
        }

        config
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are Some. A
    /// non-empty file list replaces the current one.
    pub fn merge(&mut self, other: &Self) {
        if let Some(ref data_dir) = other.data_dir {
            self.data_dir = Some(data_dir.clone());
        }
        if let Some(ref username) = other.username {
            self.username = Some(username.clone());
        }
        if let Some(ref shared_space) = other.shared_space {
            self.shared_space = Some(shared_space.clone());
        }
        if let Some(ref hub_endpoint) = other.hub_endpoint {
            self.hub_endpoint = Some(hub_endpoint.clone());
        }
        if let Some(backend) = other.backend {
            self.backend = Some(backend);
        }
        if let Some(progress_every) = other.progress_every {
            self.progress_every = Some(progress_every);
        }
        if let Some(batch_size) = other.batch_size {
            self.batch_size = Some(batch_size);
        }
        if let Some(ref trackio_dir) = other.trackio_dir {
            self.trackio_dir = Some(trackio_dir.clone());
        }
        if !other.files.is_empty() {
            self.files.clone_from(&other.files);
        }
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Reads `LOSSREPLAY_DATA_DIR`, `LOSSREPLAY_BACKEND` and `TRACKIO_DIR`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty("LOSSREPLAY_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(backend) = non_empty("LOSSREPLAY_BACKEND") {
            self.backend = Some(backend.parse()?);
        }
        if let Some(dir) = non_empty("TRACKIO_DIR") {
            self.trackio_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.progress_every == Some(0) {
            return Err(ConfigError::InvalidValue("progress_every must be >= 1".to_string()));
        }
        if self.batch_size == Some(0) {
            return Err(ConfigError::InvalidValue("batch_size must be >= 1".to_string()));
        }
        if let Some(ref space) = self.shared_space {
            validate_space_id(space)?;
        }
        if let Some(ref username) = self.username {
            if username.trim().is_empty() || username.contains('/') {
                return Err(ConfigError::InvalidValue(format!("invalid username '{username}'")));
            }
        }
        for mapping in &self.files {
            if mapping.file.trim().is_empty() {
                return Err(ConfigError::InvalidValue("files[].file must not be empty".to_string()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(DEFAULT_USERNAME)
    }

    #[must_use]
    pub fn shared_space(&self) -> &str {
        self.shared_space.as_deref().unwrap_or(DEFAULT_SHARED_SPACE)
    }

    #[must_use]
    pub fn hub_endpoint(&self) -> &str {
        self.hub_endpoint.as_deref().unwrap_or(DEFAULT_HUB_ENDPOINT).trim_end_matches('/')
    }

    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.backend.unwrap_or_default()
    }

    #[must_use]
    pub fn progress_every(&self) -> usize {
        self.progress_every.unwrap_or(DEFAULT_PROGRESS_EVERY)
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// Root of the local Trackio store (`~/.cache/huggingface/trackio` by default).
    #[must_use]
    pub fn trackio_dir(&self) -> PathBuf {
        self.trackio_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".cache")
                .join("huggingface")
                .join("trackio")
        })
    }

    /// Configured file mappings, or the built-in list when none are set.
    #[must_use]
    pub fn file_mappings(&self) -> Vec<FileMapping> {
        if self.files.is_empty() { default_file_mappings() } else { self.files.clone() }
    }
}

/// Read the Hub token from `HF_TOKEN` (or the legacy `HUGGING_FACE_HUB_TOKEN`).
#[must_use]
pub fn hf_token_from_env() -> Option<String> {
    ["HF_TOKEN", "HUGGING_FACE_HUB_TOKEN"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|v| !v.trim().is_empty())
}

fn validate_space_id(space_id: &str) -> ConfigResult<()> {
    match space_id.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(()),
        _ => Err(ConfigError::InvalidValue(format!("space id must be 'owner/name', got '{space_id}'"))),
    }
}
