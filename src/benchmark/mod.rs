//! Benchmark sampling and statistics
//!
//! Benchmark bodies record named timing samples; after the iteration loop
//! the samples are aggregated into mean/min/max/stddev, standard error and
//! throughput per name.

mod sample;
mod stats;

pub use sample::{Benchmark, Sample, SampleRecorder};
pub use stats::{calculate_results, BenchmarkResult, SampleStatistics};
