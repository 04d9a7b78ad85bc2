//! Setup and teardown levels
//!
//! Setups run level by level from the most-base level; teardowns run for
//! every level whose setups were attempted, most-derived first, even when a
//! setup or the test itself failed.

use std::sync::Arc;
use tracing::warn;

use super::{apply_failure, run_guarded, TestCommand};
use crate::context::ExecutionContext;
use crate::error::TestFailure;
use crate::models::{FailureSite, SetUpTearDownLevel, Test, TestResult};

/// Run setups of `levels` in order, stopping at the first failure
///
/// Returns how many levels were entered and the failure, if any.
pub fn run_setups(
    levels: &[SetUpTearDownLevel],
    ctx: &mut ExecutionContext,
) -> (usize, Option<TestFailure>) {
    for (index, level) in levels.iter().enumerate() {
        for setup in level.setups() {
            if let Err(failure) = run_guarded(|| (setup.hook)(ctx)) {
                warn!(level = level.name(), hook = %setup.name, "SetUp failed: {}", failure);
                return (index + 1, Some(failure));
            }
        }
    }
    (levels.len(), None)
}

/// Run teardowns of `levels` most-derived first; every teardown runs
pub fn run_teardowns(levels: &[SetUpTearDownLevel], ctx: &mut ExecutionContext) -> Vec<TestFailure> {
    let mut failures = Vec::new();
    for level in levels.iter().rev() {
        for teardown in level.teardowns() {
            if let Err(failure) = run_guarded(|| (teardown.hook)(ctx)) {
                warn!(level = level.name(), hook = %teardown.name, "TearDown failed: {}", failure);
                failures.push(failure);
            }
        }
    }
    failures
}

pub struct SetUpTearDownCommand {
    inner: Arc<dyn TestCommand>,
    levels: Vec<SetUpTearDownLevel>,
}

impl SetUpTearDownCommand {
    pub fn new(inner: Arc<dyn TestCommand>, levels: Vec<SetUpTearDownLevel>) -> Self {
        Self { inner, levels }
    }
}

impl TestCommand for SetUpTearDownCommand {
    fn test(&self) -> &Arc<Test> {
        self.inner.test()
    }

    fn execute(&self, ctx: &mut ExecutionContext, result: &mut TestResult) -> Result<(), TestFailure> {
        let (entered, failure) = run_setups(&self.levels, ctx);
        match failure {
            None => self.inner.execute(ctx, result)?,
            Some(failure) => apply_failure(result, &failure, FailureSite::SetUp, "SetUp : "),
        }

        for failure in run_teardowns(&self.levels[..entered], ctx) {
            result.record_teardown_failure(format!("TearDown : {failure}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::run;
    use crate::commands::{ResultCaptureCommand, TestMethodCommand};
    use crate::models::{MethodBuilder, Outcome, SuiteBuilder};
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn logging(
        log: &Log,
        entry: &'static str,
    ) -> impl Fn(&mut ExecutionContext) -> Result<(), TestFailure> + Send + Sync + 'static {
        let log = log.clone();
        move |_| {
            log.lock().push(entry);
            Ok(())
        }
    }

    fn command_for(fixture: &Arc<Test>) -> Arc<dyn TestCommand> {
        let leaf = Arc::clone(&fixture.children()[0]);
        let inner = Arc::new(ResultCaptureCommand::new(Arc::new(TestMethodCommand::new(leaf))));
        Arc::new(SetUpTearDownCommand::new(inner, fixture.per_test_levels().to_vec()))
    }

    #[test]
    fn test_setup_failure_skips_body_but_runs_teardown() {
        let log: Log = Arc::default();
        let fixture = SuiteBuilder::fixture("F")
            .level(
                SetUpTearDownLevel::new("Base")
                    .setup("Fails", |_| Err(TestFailure::error("no db")))
                    .teardown("Cleanup", logging(&log, "base teardown")),
            )
            .level(SetUpTearDownLevel::new("Derived").teardown("Never", logging(&log, "derived teardown")))
            .test(MethodBuilder::new("T", logging(&log, "body")))
            .build();

        let result = run(&command_for(&fixture));

        assert_eq!(result.outcome, Outcome::Error);
        assert_eq!(result.site, Some(FailureSite::SetUp));
        assert_eq!(result.message.as_deref(), Some("SetUp : no db"));
        assert_eq!(*log.lock(), ["base teardown"]);
    }

    #[test]
    fn test_teardown_failure_keeps_earlier_failure() {
        let fixture = SuiteBuilder::fixture("F")
            .level(SetUpTearDownLevel::new("L").teardown("Bad", |_| Err(TestFailure::error("leak"))))
            .test(MethodBuilder::new("T", |_| Err(TestFailure::assertion("wrong"))))
            .build();

        let result = run(&command_for(&fixture));

        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(result.message.as_deref(), Some("wrong\nTearDown : leak"));
    }

    #[test]
    fn test_teardown_failure_after_success() {
        let fixture = SuiteBuilder::fixture("F")
            .level(SetUpTearDownLevel::new("L").teardown("Panics", |_| panic!("dangling handle")))
            .test(MethodBuilder::new("T", |_| Ok(())))
            .build();

        let result = run(&command_for(&fixture));

        assert_eq!(result.outcome, Outcome::Error);
        assert_eq!(result.site, Some(FailureSite::TearDown));
        assert_eq!(result.message.as_deref(), Some("TearDown : dangling handle"));
    }
}
