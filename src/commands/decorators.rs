//! Attribute-supplied decorators and the skip command

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::TestCommand;
use crate::context::ExecutionContext;
use crate::error::TestFailure;
use crate::models::{FailureSite, Outcome, RunState, Test, TestResult};
use crate::utils::Timer;

/// Fails a passing test whose elapsed time exceeds the maximum
pub struct MaxTimeCommand {
    inner: Arc<dyn TestCommand>,
    max: Duration,
}

impl MaxTimeCommand {
    pub fn new(inner: Arc<dyn TestCommand>, max: Duration) -> Self {
        Self { inner, max }
    }
}

impl TestCommand for MaxTimeCommand {
    fn test(&self) -> &Arc<Test> {
        self.inner.test()
    }

    fn execute(&self, ctx: &mut ExecutionContext, result: &mut TestResult) -> Result<(), TestFailure> {
        let timer = Timer::start(self.test().full_name());
        self.inner.execute(ctx, result)?;
        let elapsed = timer.stop();

        if result.outcome == Outcome::Success && elapsed > self.max {
            result.set_failure(
                Outcome::Failure,
                FailureSite::Test,
                format!(
                    "Elapsed time of {}ms exceeds maximum of {}ms",
                    elapsed.as_millis(),
                    self.max.as_millis()
                ),
            );
        }
        Ok(())
    }
}

/// Runs the inner chain `count` times, stopping at the first non-success
///
/// A count of zero runs the chain once.
pub struct RepeatCommand {
    inner: Arc<dyn TestCommand>,
    count: u32,
}

impl RepeatCommand {
    pub fn new(inner: Arc<dyn TestCommand>, count: u32) -> Self {
        Self {
            inner,
            count: count.max(1),
        }
    }
}

impl TestCommand for RepeatCommand {
    fn test(&self) -> &Arc<Test> {
        self.inner.test()
    }

    fn execute(&self, ctx: &mut ExecutionContext, result: &mut TestResult) -> Result<(), TestFailure> {
        for run in 0..self.count {
            self.inner.execute(ctx, result)?;
            if result.outcome != Outcome::Success {
                debug!(test = self.test().full_name(), run, "Repeat stopped early");
                break;
            }
        }
        Ok(())
    }
}

/// Records the outcome of a test that is not run
pub struct SkipCommand {
    test: Arc<Test>,
    run_state: RunState,
}

impl SkipCommand {
    pub fn new(test: Arc<Test>, run_state: RunState) -> Self {
        Self { test, run_state }
    }
}

impl TestCommand for SkipCommand {
    fn test(&self) -> &Arc<Test> {
        &self.test
    }

    fn execute(&self, _ctx: &mut ExecutionContext, result: &mut TestResult) -> Result<(), TestFailure> {
        let reason = self.test.skip_reason().map(str::to_string);
        match self.run_state {
            RunState::NotRunnable => result.set_failure(
                Outcome::Error,
                FailureSite::Test,
                reason.unwrap_or_else(|| "Test is not runnable".to_string()),
            ),
            RunState::Explicit => result.set_result(
                Outcome::Skipped,
                Some(reason.unwrap_or_else(|| "Explicit test".to_string())),
            ),
            _ => result.set_result(Outcome::Skipped, reason),
        }
        Ok(())
    }
}
