//! Application configuration for modulsync.
//!
//! User config lives at `~/.modulsync/modulsync.toml`.
//! CLI flags override config file values, which override defaults.
//! Each pipeline phase receives the section it needs explicitly; there is no
//! global path state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModulsyncError, Result};
use crate::types::DEFAULT_SOURCE_URL;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "modulsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".modulsync";

// ---------------------------------------------------------------------------
// Config structs (matching modulsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Filesystem locations used by the pipeline phases.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Fetch phase settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding raw HTML documents and `module_index.json`.
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    /// Working copy of the master dataset.
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Directory of dated dataset backups.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Directory receiving `UPDATE-REPORT-<date>.md` files.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Output file of the validation phase.
    #[serde(default = "default_validation_report")]
    pub validation_report: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            dataset_path: default_dataset_path(),
            backup_dir: default_backup_dir(),
            report_dir: default_report_dir(),
            validation_report: default_validation_report(),
        }
    }
}

impl PathsConfig {
    /// Resolve every relative path against `root`.
    pub fn rooted_at(&self, root: &Path) -> Self {
        let join = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        };
        Self {
            raw_dir: join(&self.raw_dir),
            dataset_path: join(&self.dataset_path),
            backup_dir: join(&self.backup_dir),
            report_dir: join(&self.report_dir),
            validation_report: join(&self.validation_report),
        }
    }
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw_html")
}
fn default_dataset_path() -> PathBuf {
    PathBuf::from("data/it-module-master.json")
}
fn default_backup_dir() -> PathBuf {
    PathBuf::from("data/backups")
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("docs")
}
fn default_validation_report() -> PathBuf {
    PathBuf::from("data/validation_report.txt")
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Catalog site base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Number of concurrent page downloads.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Keep documents already on disk instead of downloading them again.
    /// Only meant for resuming an interrupted batch: a skipped page can never
    /// show up as changed.
    #[serde(default)]
    pub skip_existing: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            skip_existing: false,
        }
    }
}

impl FetchConfig {
    /// Per-request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject settings the fetcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ModulsyncError::config("fetch.workers must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(ModulsyncError::config("fetch.timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    DEFAULT_SOURCE_URL.into()
}
fn default_workers() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.modulsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ModulsyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.modulsync/modulsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ModulsyncError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ModulsyncError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.fetch.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ModulsyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ModulsyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ModulsyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("dataset_path"));
        assert!(toml_str.contains("modulbaukasten.ch"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.fetch.workers, 5);
        assert_eq!(parsed.fetch.timeout_secs, 30);
        assert_eq!(parsed.paths.backup_dir, PathBuf::from("data/backups"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[paths]
report_dir = "/srv/reports"

[fetch]
workers = 8
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.report_dir, PathBuf::from("/srv/reports"));
        assert_eq!(config.paths.raw_dir, PathBuf::from("data/raw_html"));
        assert_eq!(config.fetch.workers, 8);
        assert!(!config.fetch.skip_existing);
    }

    #[test]
    fn rooted_paths_keep_absolute_entries() {
        let mut paths = PathsConfig::default();
        paths.report_dir = PathBuf::from("/srv/reports");
        let rooted = paths.rooted_at(Path::new("/work"));
        assert_eq!(rooted.dataset_path, PathBuf::from("/work/data/it-module-master.json"));
        assert_eq!(rooted.report_dir, PathBuf::from("/srv/reports"));
    }

    #[test]
    fn zero_workers_rejected() {
        let fetch = FetchConfig {
            workers: 0,
            ..FetchConfig::default()
        };
        let err = fetch.validate().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }
}
