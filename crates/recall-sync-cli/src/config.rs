use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use recall_sync::{CleanOptions, FingerprintScope, TextEncoding, read_list};
use serde::{Deserialize, Serialize};

/// NHTSA recalls flat file.
pub const DEFAULT_URL: &str = "https://static.nhtsa.gov/odi/ffdd/rcl/FLAT_RCL.zip";

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Where archives are extracted and the fingerprint record lives.
    pub destination: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub scope: ScopeSetting,
    #[serde(default)]
    pub clean: CleanConfig,
}

/// Serialized form of [`FingerprintScope`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeSetting {
    #[default]
    FirstEntry,
    AllEntries,
}

impl From<ScopeSetting> for FingerprintScope {
    fn from(setting: ScopeSetting) -> Self {
        match setting {
            ScopeSetting::FirstEntry => FingerprintScope::FirstEntry,
            ScopeSetting::AllEntries => FingerprintScope::AllEntries,
        }
    }
}

/// The `[clean]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanConfig {
    /// Dataset file name inside the destination.
    #[serde(default = "default_dataset")]
    pub dataset: String,
    pub column_names: Option<Vec<String>>,
    /// Sidecar list of column names; used when `column_names` is unset.
    pub column_names_file: Option<PathBuf>,
    pub category_filter: Option<Vec<String>>,
    /// Sidecar list of allowed categories; used when `category_filter` is unset.
    pub category_filter_file: Option<PathBuf>,
    #[serde(default = "default_category_column")]
    pub category_column: String,
    #[serde(default = "default_dedup_key")]
    pub dedup_key: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            column_names: None,
            column_names_file: None,
            category_filter: None,
            category_filter_file: None,
            category_column: default_category_column(),
            dedup_key: default_dedup_key(),
            encoding: default_encoding(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            destination: None,
            timeout_secs: default_timeout_secs(),
            scope: ScopeSetting::default(),
            clean: CleanConfig::default(),
        }
    }
}

fn default_url() -> String {
    DEFAULT_URL.into()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_dataset() -> String {
    "FLAT_RCL.txt".into()
}

fn default_category_column() -> String {
    "Make".into()
}

fn default_dedup_key() -> String {
    "Campaign Number".into()
}

fn default_encoding() -> String {
    "latin1".into()
}

impl AppConfig {
    /// Configured destination, or `~/.local/share/recall-sync` (platform
    /// equivalent) when unset.
    pub fn destination(&self) -> Result<PathBuf> {
        match &self.destination {
            Some(dir) => Ok(dir.clone()),
            None => {
                let base = dirs::data_dir().context("could not determine data directory")?;
                Ok(base.join("recall-sync"))
            }
        }
    }

    pub fn dataset_path(&self, destination: &Path) -> PathBuf {
        destination.join(&self.clean.dataset)
    }
}

impl CleanConfig {
    /// Resolve inline lists and sidecar files into [`CleanOptions`].
    /// Relative sidecar paths are taken relative to `base`.
    pub fn to_options(&self, base: &Path) -> Result<CleanOptions> {
        let column_names = match (&self.column_names, &self.column_names_file) {
            (Some(names), _) => Some(names.clone()),
            (None, Some(file)) => Some(load_sidecar(base, file)?),
            (None, None) => None,
        };

        let category_filter = match (&self.category_filter, &self.category_filter_file) {
            (Some(values), _) => Some(values.iter().cloned().collect::<HashSet<_>>()),
            (None, Some(file)) => Some(load_sidecar(base, file)?.into_iter().collect()),
            (None, None) => None,
        };

        let encoding = TextEncoding::parse(&self.encoding)
            .with_context(|| format!("unknown encoding: {}", self.encoding))?;

        Ok(CleanOptions {
            column_names,
            category_filter,
            category_column: self.category_column.clone(),
            dedup_key: self.dedup_key.clone(),
            encoding,
        })
    }
}

fn load_sidecar(base: &Path, file: &Path) -> Result<Vec<String>> {
    let path = if file.is_absolute() {
        file.to_owned()
    } else {
        base.join(file)
    };
    read_list(&path).with_context(|| format!("failed to read list {}", path.display()))
}

/// Config file path: `~/.config/recall-sync/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("recall-sync").join("config.toml"))
}

/// Load config from an explicit path; a missing or invalid file is an error.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("failed to parse config at {}", path.display()))
}

/// Load config from the default location, falling back to defaults if missing.
pub fn load_config() -> AppConfig {
    if let Some(path) = config_path()
        && let Ok(contents) = std::fs::read_to_string(&path)
    {
        match toml::from_str::<AppConfig>(&contents) {
            Ok(config) => return config,
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config, using defaults"
            ),
        }
    }

    AppConfig::default()
}
