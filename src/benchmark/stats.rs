//! Benchmark statistics
//!
//! Aggregates the raw samples of one leaf execution into per-name results.
//! The first sample of every name is a warm-up run and is discarded.

use indexmap::IndexMap;
use serde::Serialize;

use super::sample::Sample;
use crate::utils::{ticks_to_ms, TICKS_PER_SECOND};

fn to_ms(ticks: f64) -> f64 {
    ticks * 1000.0 / TICKS_PER_SECOND
}

/// Statistics over the measured samples of one name, in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SampleStatistics {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl SampleStatistics {
    /// `None` when `ticks` is empty
    pub fn from_ticks(ticks: &[u64]) -> Option<Self> {
        if ticks.is_empty() {
            return None;
        }

        let count = ticks.len() as f64;
        let mean = ticks.iter().map(|&t| t as f64).sum::<f64>() / count;
        let variance = ticks
            .iter()
            .map(|&t| (t as f64 - mean).powi(2))
            .sum::<f64>()
            / count;

        let min = ticks.iter().copied().min().unwrap_or_default();
        let max = ticks.iter().copied().max().unwrap_or_default();

        Some(Self {
            mean: to_ms(mean),
            min: ticks_to_ms(min),
            max: ticks_to_ms(max),
            std_dev: to_ms(variance.sqrt()),
        })
    }
}

/// Aggregate over all samples sharing a name within one leaf execution
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub name: String,
    /// Measured samples, excluding the warm-up
    pub count: usize,
    pub iterations_per_sample: Option<u32>,
    #[serde(flatten)]
    pub statistics: Option<SampleStatistics>,
    pub std_err_percent: Option<f64>,
    pub ops_per_second: Option<f64>,
    pub raw_samples: Vec<Sample>,
}

impl BenchmarkResult {
    /// Build a result from the samples of one name, warm-up included
    pub fn from_group(name: String, group: Vec<Sample>, iterations: Option<u32>) -> Self {
        let raw_samples: Vec<Sample> = group.into_iter().skip(1).collect();
        let ticks: Vec<u64> = raw_samples.iter().map(|s| s.elapsed_ticks).collect();
        let statistics = SampleStatistics::from_ticks(&ticks);
        let count = raw_samples.len();

        let std_err_percent = statistics
            .filter(|s| s.mean > 0.0)
            .map(|s| s.std_dev / (s.mean * (count as f64).sqrt()) * 100.0);

        let ops_per_second = match (statistics, iterations) {
            (Some(s), Some(iter)) if s.mean > 0.0 => Some(1000.0 * f64::from(iter) / s.mean),
            _ => None,
        };

        Self {
            name,
            count,
            iterations_per_sample: iterations,
            statistics,
            std_err_percent,
            ops_per_second,
            raw_samples,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        self.statistics.map(|s| s.mean)
    }

    pub fn min(&self) -> Option<f64> {
        self.statistics.map(|s| s.min)
    }

    pub fn max(&self) -> Option<f64> {
        self.statistics.map(|s| s.max)
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.statistics.map(|s| s.std_dev)
    }

    /// True when only the warm-up sample was recorded
    pub fn is_undefined(&self) -> bool {
        self.statistics.is_none()
    }

    /// One-line summary, e.g. `Mean=1.20, Min=1.00, Max=1.50, StdDev=0.10, StdErr=3.72%`
    pub fn format_summary(&self) -> String {
        let Some(s) = self.statistics else {
            return " no measured samples".to_string();
        };

        let mut line = format!(
            " Mean={:.2}, Min={:.2}, Max={:.2}, StdDev={:.2}, StdErr={:.2}%",
            s.mean,
            s.min,
            s.max,
            s.std_dev,
            self.std_err_percent.unwrap_or(0.0)
        );
        if let Some(ops) = self.ops_per_second {
            line.push_str(&format!(", Ops={ops:.2}"));
        }
        line
    }
}

/// Group samples by name in order of first appearance and aggregate each group
pub fn calculate_results(samples: &[Sample], iterations: Option<u32>) -> Vec<BenchmarkResult> {
    let mut groups: IndexMap<&str, Vec<Sample>> = IndexMap::new();
    for sample in samples {
        groups
            .entry(sample.name.as_str())
            .or_default()
            .push(sample.clone());
    }

    groups
        .into_iter()
        .map(|(name, group)| BenchmarkResult::from_group(name.to_string(), group, iterations))
        .collect()
}
