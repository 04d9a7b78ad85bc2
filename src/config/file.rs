//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::RunSettings;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./benchsuite.yaml",
    "./benchsuite.yml",
    "./.benchsuite.yaml",
    "./benchsuite.json",
    "~/.benchsuite.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Run settings
    #[serde(default)]
    pub settings: RunSettings,

    /// Log level used by the binary
    #[serde(default)]
    pub log_level: Option<String>,

    /// Output format used by the binary
    #[serde(default)]
    pub format: Option<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            settings: RunSettings::default(),
            log_level: None,
            format: None,
        }
    }
}

impl ConfigFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate locations, the user config directory last
    pub fn locations() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = CONFIG_LOCATIONS.iter().map(|l| expand_path(l)).collect();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("benchsuite").join("config.yaml"));
        }
        paths
    }

    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        Self::locations().into_iter().find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = read_document(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_document(path.as_ref(), self)
    }

    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }
        if self.settings.benchmark_count == 0 {
            anyhow::bail!("benchmark_count must be at least 1");
        }
        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            settings: RunSettings::default()
                .with_default_timeout(10_000)
                .with_workers(4)
                .with_random_seed(1234),
            log_level: Some("info".to_string()),
            format: Some("table".to_string()),
        }
    }
}

pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if is_yaml_file(path) {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
    }
}

pub(crate) fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = if is_yaml_file(path) {
        serde_yaml::to_string(value).context("Failed to serialize config")?
    } else {
        serde_json::to_string_pretty(value).context("Failed to serialize config")?
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
