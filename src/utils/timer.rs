//! Timer utilities
//!
//! High-resolution timing in ticks. One tick is one nanosecond.

use std::time::{Duration, Instant};

/// Tick frequency of the high-resolution clock
pub const TICKS_PER_SECOND: f64 = 1_000_000_000.0;

/// Convert a tick count to milliseconds
pub fn ticks_to_ms(ticks: u64) -> f64 {
    ticks as f64 * 1000.0 / TICKS_PER_SECOND
}

/// Convert a duration to ticks, saturating at `u64::MAX`
pub fn duration_to_ticks(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Simple timer for measuring elapsed time
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ticks(&self) -> u64 {
        duration_to_ticks(self.elapsed())
    }

    pub fn elapsed_ms(&self) -> f64 {
        ticks_to_ms(self.elapsed_ticks())
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::trace!("{}: {}us", self.label, elapsed.as_micros());
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_timer() {
        let timer = Timer::start("test");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
        assert!(timer.elapsed_ticks() >= 10_000_000);
    }

    #[test]
    fn test_tick_conversion() {
        assert_eq!(ticks_to_ms(1_500_000), 1.5);
        assert_eq!(duration_to_ticks(Duration::from_millis(2)), 2_000_000);
    }
}
