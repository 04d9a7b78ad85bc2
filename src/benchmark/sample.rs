//! Raw timing samples
//!
//! A sample is one timed region inside a benchmark body. Bodies either start
//! and stop a [`Benchmark`] explicitly or use `ExecutionContext::measure`.

use serde::Serialize;
use std::time::Instant;

use crate::utils::{duration_to_ticks, ticks_to_ms};

/// One timed execution of a named region
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub name: String,
    pub elapsed_ticks: u64,
}

impl Sample {
    pub fn new(name: impl Into<String>, elapsed_ticks: u64) -> Self {
        Self {
            name: name.into(),
            elapsed_ticks,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        ticks_to_ms(self.elapsed_ticks)
    }
}

/// A running measurement; stopping it yields a [`Sample`]
#[derive(Debug)]
pub struct Benchmark {
    name: String,
    start: Instant,
}

impl Benchmark {
    pub fn start_new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }

    pub fn stop(self) -> Sample {
        Sample {
            elapsed_ticks: duration_to_ticks(self.start.elapsed()),
            name: self.name,
        }
    }
}

/// Samples collected during one leaf execution
#[derive(Clone, Debug, Default)]
pub struct SampleRecorder {
    samples: Vec<Sample>,
}

impl SampleRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_benchmark_measures_elapsed() {
        let bench = Benchmark::start_new("sleep");
        sleep(Duration::from_millis(5));
        let sample = bench.stop();

        assert_eq!(sample.name, "sleep");
        assert!(sample.elapsed_ms() >= 5.0);
    }

    #[test]
    fn test_recorder_clear() {
        let mut recorder = SampleRecorder::new();
        recorder.record(Sample::new("a", 10));
        recorder.record(Sample::new("a", 20));
        assert_eq!(recorder.len(), 2);

        recorder.clear();
        assert!(recorder.is_empty());
    }
}
