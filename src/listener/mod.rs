//! Test listeners
//!
//! A listener is notified of start/finish events for every node and of
//! benchmark iteration progress. Implementations must be thread-safe; under
//! parallel dispatch the runner routes events through a [`QueuingListener`]
//! so the wrapped listener is called from one thread at a time.

mod queue;

pub use queue::{EventPump, QueuingListener};

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::models::{Test, TestResult};

/// Receives progress notifications during a run
pub trait TestListener: Send + Sync {
    fn test_started(&self, test: &Arc<Test>);

    fn test_finished(&self, result: &TestResult);

    fn benchmark_iteration_started(&self, _test: &Arc<Test>, _iteration: u32, _total: u32) {}

    fn benchmark_iteration_finished(&self, _test: &Arc<Test>, _iteration: u32, _total: u32) {}
}

/// Listener that ignores every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl TestListener for NullListener {
    fn test_started(&self, _test: &Arc<Test>) {}

    fn test_finished(&self, _result: &TestResult) {}
}

/// Listener that emits `tracing` events
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingListener;

impl TestListener for TracingListener {
    fn test_started(&self, test: &Arc<Test>) {
        debug!(test = test.full_name(), "Test started");
    }

    fn test_finished(&self, result: &TestResult) {
        info!(
            test = result.full_name(),
            outcome = %result.outcome,
            duration_ms = result.duration_ms(),
            "Test finished"
        );
        for bench in &result.benchmark_results {
            info!(test = result.full_name(), bench = %bench.name, "{}", bench.format_summary());
        }
    }

    fn benchmark_iteration_finished(&self, test: &Arc<Test>, iteration: u32, total: u32) {
        trace!(test = test.full_name(), "Iteration {}/{}", iteration + 1, total);
    }
}

/// A listener event with owned data
#[derive(Clone, Debug)]
pub enum ListenerEvent {
    TestStarted(Arc<Test>),
    TestFinished(TestResult),
    IterationStarted(Arc<Test>, u32, u32),
    IterationFinished(Arc<Test>, u32, u32),
}

impl ListenerEvent {
    /// Deliver the event to `listener`
    pub fn dispatch_to(&self, listener: &dyn TestListener) {
        match self {
            ListenerEvent::TestStarted(test) => listener.test_started(test),
            ListenerEvent::TestFinished(result) => listener.test_finished(result),
            ListenerEvent::IterationStarted(test, i, n) => {
                listener.benchmark_iteration_started(test, *i, *n)
            }
            ListenerEvent::IterationFinished(test, i, n) => {
                listener.benchmark_iteration_finished(test, *i, *n)
            }
        }
    }
}

/// Listener that records every event in order
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().clone()
    }

    /// Full names of started tests, in event order
    pub fn started(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ListenerEvent::TestStarted(test) => Some(test.full_name().to_string()),
                _ => None,
            })
            .collect()
    }

    /// Full names of finished tests, in event order
    pub fn finished(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ListenerEvent::TestFinished(result) => Some(result.full_name().to_string()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ListenerEvent) {
        self.events.lock().push(event);
    }
}

impl TestListener for RecordingListener {
    fn test_started(&self, test: &Arc<Test>) {
        self.push(ListenerEvent::TestStarted(Arc::clone(test)));
    }

    fn test_finished(&self, result: &TestResult) {
        self.push(ListenerEvent::TestFinished(result.clone()));
    }

    fn benchmark_iteration_started(&self, test: &Arc<Test>, iteration: u32, total: u32) {
        self.push(ListenerEvent::IterationStarted(Arc::clone(test), iteration, total));
    }

    fn benchmark_iteration_finished(&self, test: &Arc<Test>, iteration: u32, total: u32) {
        self.push(ListenerEvent::IterationFinished(Arc::clone(test), iteration, total));
    }
}
