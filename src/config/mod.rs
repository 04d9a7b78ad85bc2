//! Run settings
//!
//! Settings arrive as a string map (the form hosts pass them in), from a
//! yaml/json file, or from `BENCHSUITE_*` environment variables.

mod env;
mod file;

pub use env::{print_env_help, EnvBuilder, EnvConfig, EnvGuard};
pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::context::DEFAULT_BENCH_COUNT;
use crate::error::EngineError;

/// Setting keys understood by [`RunSettings::from_map`]
pub mod keys {
    pub const DEFAULT_TIMEOUT: &str = "DefaultTimeout";
    pub const STOP_ON_ERROR: &str = "StopOnError";
    pub const NUMBER_OF_WORKERS: &str = "NumberOfWorkers";
    pub const RANDOM_SEED: &str = "RandomSeed";
    pub const BENCHMARK_COUNT: &str = "BenchmarkCount";
    pub const WORK_DIRECTORY: &str = "WorkDirectory";
}

/// Settings of one run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Timeout in ms for leaves that declare none; 0 disables it
    pub default_timeout_ms: u64,

    pub stop_on_error: bool,

    /// Worker count; `None` defers to the root's level of parallelism
    /// and `Some(0)` forces sequential dispatch
    pub number_of_workers: Option<usize>,

    pub random_seed: u64,

    /// Measured runs per benchmark leaf, not counting the warm-up
    pub benchmark_count: u32,

    pub work_directory: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: 0,
            stop_on_error: false,
            number_of_workers: None,
            random_seed: rand::random(),
            benchmark_count: DEFAULT_BENCH_COUNT,
            work_directory: PathBuf::from("."),
        }
    }
}

impl RunSettings {
    /// Build settings from a key/value map; unknown keys are ignored
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, EngineError> {
        let mut settings = Self::default();
        for (key, value) in map {
            if !settings.apply(key, value)? {
                warn!("Ignoring unknown setting {}", key);
            }
        }
        Ok(settings)
    }

    /// Apply one setting; returns whether the key was recognized
    pub fn apply(&mut self, key: &str, value: &str) -> Result<bool, EngineError> {
        let invalid = || EngineError::InvalidSetting {
            key: key.to_string(),
            value: value.to_string(),
        };
        let value = value.trim();

        match key {
            keys::DEFAULT_TIMEOUT => self.default_timeout_ms = value.parse().map_err(|_| invalid())?,
            keys::STOP_ON_ERROR => self.stop_on_error = parse_bool(value).ok_or_else(invalid)?,
            keys::NUMBER_OF_WORKERS => {
                self.number_of_workers = Some(value.parse().map_err(|_| invalid())?)
            }
            keys::RANDOM_SEED => self.random_seed = value.parse().map_err(|_| invalid())?,
            keys::BENCHMARK_COUNT => {
                let count: u32 = value.parse().map_err(|_| invalid())?;
                if count == 0 {
                    return Err(invalid());
                }
                self.benchmark_count = count;
            }
            keys::WORK_DIRECTORY => self.work_directory = PathBuf::from(value),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// The settings as a key/value map
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(keys::DEFAULT_TIMEOUT.to_string(), self.default_timeout_ms.to_string());
        map.insert(keys::STOP_ON_ERROR.to_string(), self.stop_on_error.to_string());
        if let Some(workers) = self.number_of_workers {
            map.insert(keys::NUMBER_OF_WORKERS.to_string(), workers.to_string());
        }
        map.insert(keys::RANDOM_SEED.to_string(), self.random_seed.to_string());
        map.insert(keys::BENCHMARK_COUNT.to_string(), self.benchmark_count.to_string());
        map.insert(
            keys::WORK_DIRECTORY.to_string(),
            self.work_directory.display().to_string(),
        );
        map
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.number_of_workers = Some(workers);
        self
    }

    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_benchmark_count(mut self, count: u32) -> Self {
        self.benchmark_count = count;
        self
    }

    /// Load settings from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        file::read_document(path.as_ref())
    }

    /// Save settings to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        file::write_document(path.as_ref(), self)
    }
}

/// Lenient boolean parsing shared by map and environment settings
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let settings = RunSettings::default();
        assert_eq!(settings.default_timeout_ms, 0);
        assert_eq!(settings.number_of_workers, None);
        assert_eq!(settings.benchmark_count, DEFAULT_BENCH_COUNT);
    }

    #[test]
    fn test_from_map() {
        let settings = RunSettings::from_map(&map(&[
            ("DefaultTimeout", "250"),
            ("StopOnError", "true"),
            ("NumberOfWorkers", "4"),
            ("RandomSeed", "42"),
            ("BenchmarkCount", "10"),
            ("Unknown", "ignored"),
        ]))
        .unwrap();

        assert_eq!(settings.default_timeout_ms, 250);
        assert!(settings.stop_on_error);
        assert_eq!(settings.number_of_workers, Some(4));
        assert_eq!(settings.random_seed, 42);
        assert_eq!(settings.benchmark_count, 10);
    }

    #[test]
    fn test_from_map_rejects_malformed_values() {
        let err = RunSettings::from_map(&map(&[("NumberOfWorkers", "many")])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSetting { ref key, .. } if key == "NumberOfWorkers"));

        assert!(RunSettings::from_map(&map(&[("BenchmarkCount", "0")])).is_err());
        assert!(RunSettings::from_map(&map(&[("StopOnError", "maybe")])).is_err());
    }

    #[test]
    fn test_map_round_trip() {
        let settings = RunSettings::default().with_workers(3).with_random_seed(7);
        assert_eq!(RunSettings::from_map(&settings.to_map()).unwrap(), settings);
    }

    #[test]
    fn test_save_load_yaml_and_json() {
        let dir = tempdir().unwrap();
        let settings = RunSettings::default()
            .with_default_timeout(100)
            .with_stop_on_error(true);

        for name in ["settings.yaml", "settings.json"] {
            let path = dir.path().join(name);
            settings.save(&path).unwrap();
            assert_eq!(RunSettings::load(&path).unwrap(), settings);
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }
}
