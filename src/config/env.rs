//! Environment variable configuration
//!
//! Provides environment variable overrides for run settings.

use std::env;
use std::path::PathBuf;

use super::{parse_bool, RunSettings};

/// Environment variable prefix
const ENV_PREFIX: &str = "BENCHSUITE";

/// Configuration read from `BENCHSUITE_*` variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// BENCHSUITE_TIMEOUT, in ms
    pub default_timeout_ms: Option<u64>,
    /// BENCHSUITE_STOP_ON_ERROR
    pub stop_on_error: Option<bool>,
    /// BENCHSUITE_WORKERS
    pub workers: Option<usize>,
    /// BENCHSUITE_SEED
    pub random_seed: Option<u64>,
    /// BENCHSUITE_BENCH_COUNT
    pub benchmark_count: Option<u32>,
    /// BENCHSUITE_WORK_DIR
    pub work_directory: Option<PathBuf>,
    /// BENCHSUITE_CONFIG
    pub config_file: Option<String>,
    /// BENCHSUITE_FORMAT
    pub format: Option<String>,
    /// BENCHSUITE_LOG
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            default_timeout_ms: get_env_parse("TIMEOUT"),
            stop_on_error: get_env("STOP_ON_ERROR").and_then(|v| parse_bool(&v)),
            workers: get_env_parse("WORKERS"),
            random_seed: get_env_parse("SEED"),
            benchmark_count: get_env_parse::<u32>("BENCH_COUNT").filter(|count| *count > 0),
            work_directory: get_env("WORK_DIR").map(PathBuf::from),
            config_file: get_env("CONFIG"),
            format: get_env("FORMAT"),
            log_level: get_env("LOG"),
        }
    }

    /// Check if any run setting is overridden
    pub fn has_any(&self) -> bool {
        self.default_timeout_ms.is_some()
            || self.stop_on_error.is_some()
            || self.workers.is_some()
            || self.random_seed.is_some()
            || self.benchmark_count.is_some()
            || self.work_directory.is_some()
    }

    /// Override `settings` with every variable that is set
    pub fn apply_to(&self, settings: &mut RunSettings) {
        if let Some(timeout) = self.default_timeout_ms {
            settings.default_timeout_ms = timeout;
        }
        if let Some(stop) = self.stop_on_error {
            settings.stop_on_error = stop;
        }
        if let Some(workers) = self.workers {
            settings.number_of_workers = Some(workers);
        }
        if let Some(seed) = self.random_seed {
            settings.random_seed = seed;
        }
        if let Some(count) = self.benchmark_count {
            settings.benchmark_count = count;
        }
        if let Some(dir) = &self.work_directory {
            settings.work_directory = dir.clone();
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Builder for setting environment variables (useful for testing)
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn var(mut self, name: &str, value: impl ToString) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.to_string()));
        self
    }

    pub fn timeout(self, timeout_ms: u64) -> Self {
        self.var("TIMEOUT", timeout_ms)
    }

    pub fn stop_on_error(self, stop: bool) -> Self {
        self.var("STOP_ON_ERROR", stop)
    }

    pub fn workers(self, workers: usize) -> Self {
        self.var("WORKERS", workers)
    }

    pub fn seed(self, seed: u64) -> Self {
        self.var("SEED", seed)
    }

    pub fn bench_count(self, count: u32) -> Self {
        self.var("BENCH_COUNT", count)
    }

    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all BENCHSUITE environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_TIMEOUT        Default timeout per test in ms (0 = none)");
    println!("  {ENV_PREFIX}_STOP_ON_ERROR  Stop the run after the first failure (true/false)");
    println!("  {ENV_PREFIX}_WORKERS        Worker threads (0 = sequential)");
    println!("  {ENV_PREFIX}_SEED           Random seed");
    println!("  {ENV_PREFIX}_BENCH_COUNT    Measured runs per benchmark");
    println!("  {ENV_PREFIX}_WORK_DIR       Work directory exposed to tests");
    println!("  {ENV_PREFIX}_CONFIG         Path to configuration file");
    println!("  {ENV_PREFIX}_FORMAT         Output format (table, json, json-pretty, summary)");
    println!("  {ENV_PREFIX}_LOG            Log level (trace, debug, info, warn, error)");
}

#[cfg(test)]
mod tests {
    use super::*;

    // The process environment is global; keep all variable-setting checks here
    #[test]
    fn test_env_overrides() {
        let _guard = EnvBuilder::new()
            .timeout(750)
            .stop_on_error(true)
            .workers(3)
            .seed(99)
            .bench_count(0)
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.default_timeout_ms, Some(750));
        assert_eq!(config.stop_on_error, Some(true));
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.benchmark_count, None);
        assert!(config.has_any());

        let mut settings = RunSettings::default();
        config.apply_to(&mut settings);
        assert_eq!(settings.default_timeout_ms, 750);
        assert_eq!(settings.number_of_workers, Some(3));
        assert_eq!(settings.random_seed, 99);
        assert_eq!(settings.benchmark_count, 5);
    }

    #[test]
    fn test_empty_config_changes_nothing() {
        let empty = EnvConfig::default();
        assert!(!empty.has_any());

        let mut settings = RunSettings::default().with_random_seed(1);
        let before = settings.clone();
        empty.apply_to(&mut settings);
        assert_eq!(settings, before);
    }
}
