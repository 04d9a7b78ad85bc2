//! Execution context
//!
//! Per-work-item state threaded through a run. A child context starts as a
//! copy of its parent's and then applies overrides declared on the child
//! test (timeout, bench count, parallel scope). Test bodies receive the
//! context mutably and use it for assertions, sampling and cancellation
//! checks.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::benchmark::{Benchmark, Sample, SampleRecorder};
use crate::error::TestFailure;
use crate::executor::WorkItemDispatcher;
use crate::listener::TestListener;
use crate::models::{ParallelScope, Test};

/// Measured runs per benchmark leaf when nothing overrides it
pub const DEFAULT_BENCH_COUNT: u32 = 5;

/// Stop level of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StopLevel {
    Running = 0,
    /// Items not yet started are cancelled
    StopRequested = 1,
    /// Additionally cancels in-flight isolated items
    AbortRequested = 2,
}

/// Shared stop flag of one run
#[derive(Clone, Debug, Default)]
pub struct RunStatus {
    level: Arc<AtomicU8>,
}

impl RunStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> StopLevel {
        match self.level.load(Ordering::SeqCst) {
            0 => StopLevel::Running,
            1 => StopLevel::StopRequested,
            _ => StopLevel::AbortRequested,
        }
    }

    /// Raise the stop level; never lowers it
    pub fn request_stop(&self, force: bool) {
        let level = if force {
            StopLevel::AbortRequested
        } else {
            StopLevel::StopRequested
        };
        self.level.fetch_max(level as u8, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.level() >= StopLevel::StopRequested
    }

    pub fn is_abort_requested(&self) -> bool {
        self.level() == StopLevel::AbortRequested
    }
}

/// Cooperative cancellation signal for one work item
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct ExecutionContext {
    current_test: Option<Arc<Test>>,
    listener: Arc<dyn TestListener>,
    dispatcher: Arc<dyn WorkItemDispatcher>,
    timeout_ms: u64,
    stop_on_error: bool,
    random_seed: u64,
    assert_count: u32,
    bench_count: u32,
    iterations: Option<u32>,
    /// Scope inherited from ancestors, applying to the current test
    parallel_scope: ParallelScope,
    depth: usize,
    status: RunStatus,
    cancellation: CancellationToken,
    samples: SampleRecorder,
    work_directory: PathBuf,
}

impl ExecutionContext {
    pub fn new(listener: Arc<dyn TestListener>, dispatcher: Arc<dyn WorkItemDispatcher>) -> Self {
        Self {
            current_test: None,
            listener,
            dispatcher,
            timeout_ms: 0,
            stop_on_error: false,
            random_seed: 0,
            assert_count: 0,
            bench_count: DEFAULT_BENCH_COUNT,
            iterations: None,
            parallel_scope: ParallelScope::empty(),
            depth: 0,
            status: RunStatus::new(),
            cancellation: CancellationToken::new(),
            samples: SampleRecorder::new(),
            work_directory: PathBuf::from("."),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
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

    pub fn with_bench_count(mut self, bench_count: u32) -> Self {
        self.bench_count = bench_count;
        self
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_work_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_directory = dir.into();
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn WorkItemDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Context for running `test` below the current test
    pub fn for_test(&self, test: &Arc<Test>) -> Self {
        let mut child = self.clone();
        child.parallel_scope = self.scope_for_children();
        child.depth = if self.current_test.is_some() {
            self.depth + 1
        } else {
            self.depth
        };
        child.current_test = Some(Arc::clone(test));
        child.assert_count = 0;
        child.cancellation = CancellationToken::new();
        child.samples = SampleRecorder::new();
        child.iterations = None;

        if let Some(timeout) = test.timeout_ms() {
            child.timeout_ms = timeout;
        }
        if let Some(count) = test.bench_count() {
            child.bench_count = count;
        }
        child
    }

    fn scope_for_children(&self) -> ParallelScope {
        match self.current_test.as_ref().and_then(|t| t.parallel_scope()) {
            Some(scope) => scope - ParallelScope::SELF,
            None => self.parallel_scope,
        }
    }

    pub fn current_test(&self) -> Option<&Arc<Test>> {
        self.current_test.as_ref()
    }

    pub fn listener(&self) -> &Arc<dyn TestListener> {
        &self.listener
    }

    pub fn dispatcher(&self) -> &Arc<dyn WorkItemDispatcher> {
        &self.dispatcher
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    pub fn bench_count(&self) -> u32 {
        self.bench_count
    }

    pub fn parallel_scope(&self) -> ParallelScope {
        self.parallel_scope
    }

    /// True for the context of the root test of a run
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn work_directory(&self) -> &Path {
        &self.work_directory
    }

    /// Operations per sample configured for the running benchmark
    pub fn iterations(&self) -> Option<u32> {
        self.iterations
    }

    pub(crate) fn set_iterations(&mut self, iterations: Option<u32>) {
        self.iterations = iterations;
    }

    pub fn assert_count(&self) -> u32 {
        self.assert_count
    }

    /// Deterministic generator for the current test
    ///
    /// The same run seed and test id always produce the same sequence.
    pub fn random(&self) -> StdRng {
        let id = self.current_test.as_ref().map(|t| t.id()).unwrap_or("");
        StdRng::seed_from_u64(self.random_seed ^ fnv1a(id.as_bytes()))
    }

    pub fn assert_that(&mut self, condition: bool, message: impl Into<String>) -> Result<(), TestFailure> {
        self.assert_count += 1;
        if condition {
            Ok(())
        } else {
            Err(TestFailure::assertion(message))
        }
    }

    pub fn assert_eq<T>(&mut self, expected: T, actual: T) -> Result<(), TestFailure>
    where
        T: PartialEq + fmt::Debug,
    {
        self.assert_count += 1;
        if expected == actual {
            Ok(())
        } else {
            Err(TestFailure::assertion(format!(
                "Expected: {expected:?}\n  But was:  {actual:?}"
            )))
        }
    }

    /// Record a finished sample
    pub fn record(&mut self, sample: Sample) {
        self.samples.record(sample);
    }

    /// Time `f` as one sample named `name`
    pub fn measure<R>(&mut self, name: &str, f: impl FnOnce() -> R) -> R {
        let bench = Benchmark::start_new(name);
        let value = f();
        self.samples.record(bench.stop());
        value
    }

    pub fn samples(&self) -> &[Sample] {
        self.samples.samples()
    }

    pub(crate) fn clear_samples(&mut self) {
        self.samples.clear();
    }

    /// Safe point for long-running bodies; fails once cancellation is requested
    pub fn checkpoint(&self) -> Result<(), TestFailure> {
        if self.cancellation.is_cancelled() || self.status.is_abort_requested() {
            Err(TestFailure::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("current_test", &self.current_test.as_ref().map(|t| t.full_name()))
            .field("dispatcher", &self.dispatcher.name())
            .field("timeout_ms", &self.timeout_ms)
            .field("stop_on_error", &self.stop_on_error)
            .field("random_seed", &self.random_seed)
            .field("bench_count", &self.bench_count)
            .field("parallel_scope", &self.parallel_scope)
            .finish()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
