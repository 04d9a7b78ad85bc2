//! Test runner
//!
//! Entry point for hosts: load a tree once, then count, run (blocking or
//! in the background) and stop runs over it.

use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::{dispatch_and_wait, ParallelDispatcher, SequentialDispatcher, WorkItem, WorkItemDispatcher};
use crate::commands::panic_message;
use crate::config::RunSettings;
use crate::context::{ExecutionContext, RunStatus};
use crate::error::EngineError;
use crate::filter::TestFilter;
use crate::listener::{EventPump, TestListener};
use crate::models::{Test, TestResult};
use crate::utils::Timer;

type Callback = Box<dyn FnOnce(&TestResult) + Send + 'static>;

enum RunOutcome {
    Running,
    Finished(TestResult),
    Lost,
}

struct RunShared {
    status: RunStatus,
    outcome: Mutex<RunOutcome>,
    done: Condvar,
}

/// Handle to a run in progress
#[derive(Clone)]
pub struct RunHandle {
    shared: Arc<RunShared>,
}

impl RunHandle {
    fn new(status: RunStatus) -> Self {
        Self {
            shared: Arc::new(RunShared {
                status,
                outcome: Mutex::new(RunOutcome::Running),
                done: Condvar::new(),
            }),
        }
    }

    fn finish(&self, result: Option<TestResult>) {
        let mut outcome = self.shared.outcome.lock();
        *outcome = match result {
            Some(result) => RunOutcome::Finished(result),
            None => RunOutcome::Lost,
        };
        self.shared.done.notify_all();
    }

    fn wait_until(&self, deadline: Option<Instant>) -> Option<Result<TestResult, EngineError>> {
        let mut outcome = self.shared.outcome.lock();
        loop {
            match &*outcome {
                RunOutcome::Finished(result) => return Some(Ok(result.clone())),
                RunOutcome::Lost => return Some(Err(EngineError::RunLost)),
                RunOutcome::Running => match deadline {
                    Some(deadline) => {
                        if self.shared.done.wait_until(&mut outcome, deadline).timed_out() {
                            return None;
                        }
                    }
                    None => self.shared.done.wait(&mut outcome),
                },
            }
        }
    }

    /// Block until the run completes
    pub fn wait(&self) -> Result<TestResult, EngineError> {
        self.wait_until(None).unwrap_or(Err(EngineError::RunLost))
    }

    /// Block for at most `timeout`; `None` if the run is still going
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<TestResult, EngineError>> {
        self.wait_until(Some(Instant::now() + timeout))
    }

    /// Wait for the run in a blocking task of the tokio runtime
    pub async fn join(self) -> Result<TestResult, EngineError> {
        tokio::task::spawn_blocking(move || self.wait())
            .await
            .map_err(|_| EngineError::RunLost)?
    }

    /// Request a stop; `force` also abandons in-flight isolated tests
    pub fn stop(&self, force: bool) {
        info!(force, "Stop requested");
        self.shared.status.request_stop(force);
    }

    pub fn is_complete(&self) -> bool {
        !matches!(*self.shared.outcome.lock(), RunOutcome::Running)
    }

    /// The result, once the run has completed
    pub fn result(&self) -> Option<TestResult> {
        match &*self.shared.outcome.lock() {
            RunOutcome::Finished(result) => Some(result.clone()),
            _ => None,
        }
    }
}

/// Test runner over one loaded tree
pub struct TestRunner {
    settings: RunSettings,
    loaded: Option<Arc<Test>>,
    active: Mutex<Option<RunHandle>>,
}

impl TestRunner {
    pub fn new(settings: RunSettings) -> Self {
        Self {
            settings,
            loaded: None,
            active: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Load the tree to run; returns its test case count
    pub fn load(&mut self, root: Arc<Test>) -> usize {
        let count = root.test_case_count();
        info!("Loaded {} with {} test cases", root.full_name(), count);
        self.loaded = Some(root);
        count
    }

    pub fn loaded(&self) -> Option<&Arc<Test>> {
        self.loaded.as_ref()
    }

    /// Count the leaves of the loaded tree that pass `filter`
    pub fn count_test_cases(&self, filter: &TestFilter) -> Result<usize, EngineError> {
        let root = self.loaded.as_ref().ok_or(EngineError::NoTestLoaded)?;
        Ok(filter.count_test_cases(root))
    }

    /// Run the loaded tree and block until it completes
    pub fn run(&self, listener: Arc<dyn TestListener>, filter: &TestFilter) -> Result<TestResult, EngineError> {
        self.run_async(listener, filter)?.wait()
    }

    /// Start a run in the background
    pub fn run_async(&self, listener: Arc<dyn TestListener>, filter: &TestFilter) -> Result<RunHandle, EngineError> {
        self.start_run(listener, filter, None)
    }

    /// Start a run in the background, calling `on_complete` with its result
    pub fn run_async_with_callback<F>(
        &self,
        listener: Arc<dyn TestListener>,
        filter: &TestFilter,
        on_complete: F,
    ) -> Result<RunHandle, EngineError>
    where
        F: FnOnce(&TestResult) + Send + 'static,
    {
        self.start_run(listener, filter, Some(Box::new(on_complete)))
    }

    fn start_run(
        &self,
        listener: Arc<dyn TestListener>,
        filter: &TestFilter,
        callback: Option<Callback>,
    ) -> Result<RunHandle, EngineError> {
        let root = Arc::clone(self.loaded.as_ref().ok_or(EngineError::NoTestLoaded)?);

        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|handle| !handle.is_complete()) {
            return Err(EngineError::RunInProgress);
        }

        let status = RunStatus::new();
        let handle = RunHandle::new(status.clone());
        let thread_handle = handle.clone();
        let settings = self.settings.clone();
        let filter = filter.clone();

        thread::Builder::new()
            .name("test-run".to_string())
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    let result = execute_run(&root, &filter, listener, &settings, status);
                    if let (Ok(result), Some(callback)) = (&result, callback) {
                        callback(result);
                    }
                    result
                }));

                match outcome {
                    Ok(Ok(result)) => thread_handle.finish(Some(result)),
                    Ok(Err(err)) => {
                        error!("Run failed: {}", err);
                        thread_handle.finish(None);
                    }
                    Err(payload) => {
                        error!("Run thread panicked: {}", panic_message(payload.as_ref()));
                        thread_handle.finish(None);
                    }
                }
            })?;

        *active = Some(handle.clone());
        Ok(handle)
    }

    /// Stop the current run, if any
    pub fn stop_run(&self, force: bool) {
        if let Some(handle) = self.active.lock().as_ref() {
            handle.stop(force);
        }
    }

    pub fn is_test_running(&self) -> bool {
        self.active.lock().as_ref().is_some_and(|handle| !handle.is_complete())
    }

    pub fn is_test_complete(&self) -> bool {
        self.active.lock().as_ref().is_some_and(RunHandle::is_complete)
    }

    /// Wait for the current run; true when it completed within `timeout`
    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        let handle = self.active.lock().clone();
        match handle {
            Some(handle) => handle.wait_timeout(timeout).is_some(),
            None => true,
        }
    }

    /// Result of the most recent completed run
    pub fn result(&self) -> Option<TestResult> {
        self.active.lock().as_ref().and_then(RunHandle::result)
    }
}

/// Configured workers, then the root's level, then the default pool size
/// when anything in the tree is parallelizable; 0 means sequential
fn worker_count(settings: &RunSettings, root: &Test) -> usize {
    settings
        .number_of_workers
        .or_else(|| root.level_of_parallelism())
        .unwrap_or_else(|| {
            if has_parallel_scope(root) {
                ParallelDispatcher::default_level()
            } else {
                0
            }
        })
}

fn has_parallel_scope(test: &Test) -> bool {
    test.parallel_scope().is_some_and(|scope| !scope.is_empty())
        || test.children().iter().any(|child| has_parallel_scope(child))
}

fn execute_run(
    root: &Arc<Test>,
    filter: &TestFilter,
    listener: Arc<dyn TestListener>,
    settings: &RunSettings,
    status: RunStatus,
) -> Result<TestResult, EngineError> {
    let workers = worker_count(settings, root);
    let (dispatcher, listener, pump): (Arc<dyn WorkItemDispatcher>, Arc<dyn TestListener>, _) =
        if workers > 0 {
            let (pump, queue) = EventPump::start(listener)?;
            (Arc::new(ParallelDispatcher::new(workers)?), Arc::new(queue), Some(pump))
        } else {
            (Arc::new(SequentialDispatcher::new()), listener, None)
        };

    info!(
        "Starting run of {} ({} dispatcher, seed {})",
        root.full_name(),
        dispatcher.name(),
        settings.random_seed
    );
    let timer = Timer::start(root.full_name());

    let ctx = ExecutionContext::new(listener, Arc::clone(&dispatcher))
        .with_timeout_ms(settings.default_timeout_ms)
        .with_stop_on_error(settings.stop_on_error)
        .with_random_seed(settings.random_seed)
        .with_bench_count(settings.benchmark_count)
        .with_work_directory(settings.work_directory.clone())
        .with_status(status);

    let mut item = WorkItem::create(root, filter);
    item.initialize_context(ctx.for_test(root))?;
    drop(ctx);

    let result = dispatch_and_wait(&dispatcher, item);
    if let Some(pump) = pump {
        debug!("Draining listener events");
        pump.dispose();
    }
    let result = result?;

    let summary = result.summary();
    info!(
        "Run completed in {}ms - Pass: {}/{} ({:.1}%)",
        timer.stop().as_millis(),
        summary.passed,
        summary.total,
        summary.pass_rate()
    );
    Ok(result)
}
