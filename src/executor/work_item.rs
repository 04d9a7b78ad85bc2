//! Work items
//!
//! A work item is one node of the tree being executed: a simple item wraps
//! the command chain of a leaf, a composite item owns the items of its
//! children. Items are built up front from the loaded tree and the filter;
//! nothing runs until [`WorkItem::execute`].
//!
//! Each item reports exactly one start and one finish to the listener,
//! including items that are never run because the run was stopped or
//! because their parent's one-time setup failed.

use chrono::Utc;
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::Completion;
use crate::commands::{apply_failure, make_test_command, run_setups, run_teardowns, SkipCommand, TestCommand};
use crate::context::{ExecutionContext, RunStatus};
use crate::error::EngineError;
use crate::filter::TestFilter;
use crate::listener::TestListener;
use crate::models::{FailureSite, Outcome, ParallelScope, RunState, SetUpTearDownLevel, Test, TestResult};
use crate::utils::Timer;

/// How often a thread waiting on an isolated test checks for abort and timeout
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long a cancelled isolated test gets to observe its token
const CANCEL_GRACE: Duration = Duration::from_millis(20);

const CANCELLED_MESSAGE: &str = "Test cancelled";
const CHILD_FAILURE_MESSAGE: &str = "One or more child tests had errors";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkItemState {
    Ready,
    Running,
    Complete,
}

enum Work {
    Simple(Arc<dyn TestCommand>),
    Composite(Vec<WorkItem>),
}

pub struct WorkItem {
    test: Arc<Test>,
    /// False for tests that are skipped, ignored, not runnable, or explicit
    /// without being selected
    runnable: bool,
    state: WorkItemState,
    context: Option<ExecutionContext>,
    result: TestResult,
    work: Option<Work>,
}

impl WorkItem {
    /// Build the item tree for `test`, keeping only children that pass `filter`
    pub fn create(test: &Arc<Test>, filter: &TestFilter) -> Self {
        Self::create_node(test, filter, &[], &[])
    }

    fn create_node(
        test: &Arc<Test>,
        filter: &TestFilter,
        ancestors: &[&Test],
        levels: &[SetUpTearDownLevel],
    ) -> Self {
        let runnable = match test.run_state() {
            RunState::Runnable => true,
            RunState::Explicit => filter.is_explicit_match(test, ancestors),
            RunState::Skipped | RunState::Ignored | RunState::NotRunnable => false,
        };

        let work = if test.is_suite() {
            let mut path = ancestors.to_vec();
            path.push(test.as_ref());
            let mut child_levels = levels.to_vec();
            child_levels.extend(test.per_test_levels().iter().cloned());

            let children = test
                .children()
                .iter()
                .filter(|child| filter.pass(child, &path))
                .map(|child| Self::create_node(child, filter, &path, &child_levels))
                .collect();
            Work::Composite(children)
        } else {
            Work::Simple(make_test_command(test, levels, runnable))
        };

        Self {
            test: Arc::clone(test),
            runnable,
            state: WorkItemState::Ready,
            context: None,
            result: TestResult::new(Arc::clone(test)),
            work: Some(work),
        }
    }

    pub fn test(&self) -> &Arc<Test> {
        &self.test
    }

    pub fn state(&self) -> WorkItemState {
        self.state
    }

    pub fn is_runnable(&self) -> bool {
        self.runnable
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.work, Some(Work::Composite(_)))
    }

    pub fn context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    /// Number of child items kept by the filter
    pub fn child_count(&self) -> usize {
        match &self.work {
            Some(Work::Composite(children)) => children.len(),
            _ => 0,
        }
    }

    /// Attach the context; allowed once
    pub fn initialize_context(&mut self, ctx: ExecutionContext) -> Result<(), EngineError> {
        if self.context.is_some() {
            return Err(EngineError::ContextAlreadyInitialized);
        }
        self.context = Some(ctx);
        Ok(())
    }

    /// Whether the item may run concurrently with its siblings
    pub fn is_parallelizable(&self) -> bool {
        let Some(ctx) = &self.context else {
            return false;
        };

        let scope = match self.test.parallel_scope() {
            Some(own) if own.contains(ParallelScope::SELF) => return true,
            Some(own) => own,
            None => {
                let inherited = ctx.parallel_scope();
                if inherited.contains(ParallelScope::CHILDREN) {
                    return true;
                }
                inherited
            }
        };

        if self.test.is_fixture() && scope.contains(ParallelScope::FIXTURES) {
            return true;
        }
        ctx.is_root() && !scope.is_empty()
    }

    fn transition(&mut self, next: WorkItemState) {
        debug_assert!(next > self.state, "illegal transition {:?} -> {:?}", self.state, next);
        trace!(test = self.test.full_name(), "{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the item to completion and return its result
    pub fn execute(mut self) -> TestResult {
        let Some(ctx) = self.context.take() else {
            warn!(test = self.test.full_name(), "Executed without a context");
            self.result.set_failure(
                Outcome::Error,
                FailureSite::Test,
                "Work item was executed without a context",
            );
            return self.result;
        };
        let listener = Arc::clone(ctx.listener());

        if ctx.status().is_stop_requested() {
            return self.finish_unrun(Outcome::Cancelled, None, CANCELLED_MESSAGE, &listener);
        }

        listener.test_started(&self.test);
        self.transition(WorkItemState::Running);
        self.result.start_time = Utc::now();
        let timer = Timer::start(self.test.full_name());

        let Some(work) = self.work.take() else {
            self.result.set_failure(Outcome::Error, FailureSite::Test, "Work item was already executed");
            self.work_item_complete(0, timer.stop(), &listener);
            return self.result;
        };

        let is_leaf = matches!(work, Work::Simple(_));
        let timeout_ms = if is_leaf { ctx.timeout_ms() } else { 0 };
        let status = ctx.status().clone();
        let stop_on_error = ctx.stop_on_error();
        let result = std::mem::replace(&mut self.result, TestResult::new(Arc::clone(&self.test)));

        let (ctx, result) = if self.runnable && (self.test.requires_thread() || timeout_ms > 0) {
            self.run_on_own_thread(work, ctx, result, timeout_ms, &status)
        } else {
            let (ctx, result) = run_work(&self.test, self.runnable, work, ctx, result);
            (Some(ctx), result)
        };
        self.result = result;

        let assert_count = ctx.map_or(0, |ctx| ctx.assert_count());
        self.work_item_complete(assert_count, timer.stop(), &listener);

        if is_leaf && stop_on_error && self.result.outcome.is_failure() {
            debug!(test = self.test.full_name(), "Stopping run after failure");
            status.request_stop(false);
        }
        self.result
    }

    fn run_on_own_thread(
        &self,
        work: Work,
        ctx: ExecutionContext,
        result: TestResult,
        timeout_ms: u64,
        status: &RunStatus,
    ) -> (Option<ExecutionContext>, TestResult) {
        let is_leaf = matches!(work, Work::Simple(_));
        let start_time = result.start_time;
        let token = ctx.cancellation().clone();
        if self.test.requires_thread() {
            debug!(test = self.test.full_name(), "Running on own thread because it requires one");
        } else {
            debug!(test = self.test.full_name(), "Running on own thread because it has a timeout");
        }

        let (tx, rx) = bounded(1);
        let slot = Arc::new(Mutex::new(Some((work, ctx, result))));
        let thread_slot = Arc::clone(&slot);
        let test = Arc::clone(&self.test);
        let runnable = self.runnable;

        let spawned = thread::Builder::new()
            .name(format!("test:{}", self.test.name()))
            .spawn(move || {
                let parts = thread_slot.lock().take();
                if let Some((work, ctx, result)) = parts {
                    let _ = tx.send(run_work(&test, runnable, work, ctx, result));
                }
            });

        if let Err(err) = spawned {
            warn!(test = self.test.full_name(), "Failed to spawn test thread, running inline: {}", err);
            let parts = slot.lock().take();
            return match parts {
                Some((work, ctx, result)) => {
                    let (ctx, result) = run_work(&self.test, runnable, work, ctx, result);
                    (Some(ctx), result)
                }
                None => (None, self.fresh_result(start_time)),
            };
        }

        let deadline = (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms));
        loop {
            let wait = deadline.map_or(POLL_INTERVAL, |d| {
                d.saturating_duration_since(Instant::now()).min(POLL_INTERVAL)
            });

            match rx.recv_timeout(wait) {
                Ok((ctx, result)) => return (Some(ctx), result),
                Err(RecvTimeoutError::Disconnected) => {
                    let mut result = self.fresh_result(start_time);
                    result.set_failure(
                        Outcome::Error,
                        FailureSite::Test,
                        "Test thread terminated without reporting a result",
                    );
                    return (None, result);
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            // Composites are never abandoned; their children observe the stop
            if !is_leaf {
                continue;
            }

            if status.is_abort_requested() {
                debug!(test = self.test.full_name(), "Abandoning thread after abort");
                token.cancel();
                let _ = rx.recv_timeout(CANCEL_GRACE);
                let mut result = self.fresh_result(start_time);
                result.set_result(Outcome::Cancelled, Some(CANCELLED_MESSAGE.to_string()));
                return (None, result);
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(
                    test = self.test.full_name(),
                    "Cancelling thread after timeout of {}ms", timeout_ms
                );
                token.cancel();
                let _ = rx.recv_timeout(CANCEL_GRACE);
                let mut result = self.fresh_result(start_time);
                result.set_failure(
                    Outcome::Failure,
                    FailureSite::Test,
                    format!("Test exceeded Timeout value of {timeout_ms}ms"),
                );
                return (None, result);
            }
        }
    }

    fn fresh_result(&self, start_time: chrono::DateTime<Utc>) -> TestResult {
        let mut result = TestResult::new(Arc::clone(&self.test));
        result.start_time = start_time;
        result
    }

    fn work_item_complete(&mut self, assert_count: u32, elapsed: Duration, listener: &Arc<dyn TestListener>) {
        self.result.duration = elapsed;
        self.result.assert_count += assert_count;
        self.transition(WorkItemState::Complete);
        listener.test_finished(&self.result);
    }

    /// Report the item and its whole subtree without running anything
    ///
    /// `site` is `None` for cancellation; otherwise it is where the failure
    /// that prevented the run happened, seen from the subtree.
    fn finish_unrun(
        mut self,
        outcome: Outcome,
        site: Option<FailureSite>,
        message: &str,
        listener: &Arc<dyn TestListener>,
    ) -> TestResult {
        listener.test_started(&self.test);
        self.transition(WorkItemState::Running);

        match site {
            Some(site) if outcome != Outcome::Skipped => self.result.set_failure(outcome, site, message),
            _ => self.result.set_result(outcome, Some(message.to_string())),
        }
        if let Some(Work::Composite(children)) = self.work.take() {
            self.result.children = children
                .into_iter()
                .map(|child| child.finish_unrun(outcome, site, message, listener))
                .collect();
        }

        self.transition(WorkItemState::Complete);
        listener.test_finished(&self.result);
        self.result
    }
}

/// Run the body of an item; the returned context carries its assert count
fn run_work(
    test: &Arc<Test>,
    runnable: bool,
    work: Work,
    mut ctx: ExecutionContext,
    mut result: TestResult,
) -> (ExecutionContext, TestResult) {
    match work {
        Work::Simple(command) => {
            if let Err(failure) = command.execute(&mut ctx, &mut result) {
                apply_failure(&mut result, &failure, FailureSite::Test, "");
            }
        }
        Work::Composite(children) => run_composite(test, runnable, children, &mut ctx, &mut result),
    }
    (ctx, result)
}

fn run_composite(
    test: &Arc<Test>,
    runnable: bool,
    children: Vec<WorkItem>,
    ctx: &mut ExecutionContext,
    result: &mut TestResult,
) {
    let listener = Arc::clone(ctx.listener());

    if !runnable {
        let skip = SkipCommand::new(Arc::clone(test), test.run_state());
        if let Err(failure) = skip.execute(ctx, result) {
            apply_failure(result, &failure, FailureSite::Test, "");
        }
        let (outcome, message) = (result.outcome, result.message.clone().unwrap_or_default());
        result.children = children
            .into_iter()
            .map(|child| child.finish_unrun(outcome, Some(FailureSite::Parent), &message, &listener))
            .collect();
        return;
    }

    let levels = test.one_time_levels();
    let (entered, failure) = run_setups(levels, ctx);

    match failure {
        Some(failure) => {
            apply_failure(result, &failure, FailureSite::SetUp, "");
            let (outcome, message) = (result.outcome, format!("OneTimeSetUp: {failure}"));
            result.children = children
                .into_iter()
                .map(|child| child.finish_unrun(outcome, Some(FailureSite::Parent), &message, &listener))
                .collect();
        }
        None => {
            result.children = dispatch_children(children, ctx);
            aggregate(result);
        }
    }

    for failure in run_teardowns(&levels[..entered], ctx) {
        result.record_teardown_failure(format!("OneTimeTearDown: {failure}"));
    }
    result.assert_count += result.children.iter().map(|c| c.assert_count).sum::<u32>();
}

/// Dispatch every child and collect the results in declaration order
fn dispatch_children(children: Vec<WorkItem>, ctx: &ExecutionContext) -> Vec<TestResult> {
    let dispatcher = Arc::clone(ctx.dispatcher());
    let tests: Vec<Arc<Test>> = children.iter().map(|c| Arc::clone(&c.test)).collect();
    let (tx, rx) = unbounded();

    for (index, mut child) in children.into_iter().enumerate() {
        // Built here so changes made during one-time setup reach the child
        let child_ctx = ctx.for_test(&child.test);
        if let Err(err) = child.initialize_context(child_ctx) {
            warn!(test = child.test.full_name(), "{}", err);
        }
        dispatcher.dispatch(child, Completion::new(index, tx.clone()));
    }
    drop(tx);

    let mut slots: Vec<Option<TestResult>> = tests.iter().map(|_| None).collect();
    for (index, result) in rx.iter() {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(result);
        }
    }

    slots
        .into_iter()
        .zip(tests)
        .map(|(slot, test)| {
            slot.unwrap_or_else(|| {
                warn!(test = test.full_name(), "Child did not report a result");
                let mut lost = TestResult::new(test);
                lost.set_failure(Outcome::Error, FailureSite::Test, "Test did not report a result");
                lost
            })
        })
        .collect()
}

fn aggregate(result: &mut TestResult) {
    if result.children.iter().any(|c| c.outcome.is_failure()) {
        result.set_failure(Outcome::Failure, FailureSite::Child, CHILD_FAILURE_MESSAGE);
    } else if result.children.iter().any(|c| c.outcome == Outcome::Cancelled) {
        result.set_result(Outcome::Cancelled, Some(CANCELLED_MESSAGE.to_string()));
    } else {
        result.set_result(Outcome::Success, None);
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("test", &self.test.full_name())
            .field("state", &self.state)
            .field("runnable", &self.runnable)
            .field("children", &self.child_count())
            .finish()
    }
}
