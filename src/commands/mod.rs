//! Command pipeline
//!
//! Each leaf test is run through a chain of commands built once when its
//! work item is created. From innermost to outermost:
//!
//! 1. [`TestMethodCommand`] invokes the body (in a loop for benchmarks)
//! 2. [`ResultCaptureCommand`] turns failures and panics into the outcome
//! 3. [`SetUpTearDownCommand`] runs per-test setup and teardown levels
//! 4. attribute decorators ([`MaxTimeCommand`], [`RepeatCommand`])
//!
//! Building the chain never runs anything.

mod capture;
mod decorators;
mod method;
mod setup;

pub use capture::ResultCaptureCommand;
pub use decorators::{MaxTimeCommand, RepeatCommand, SkipCommand};
pub use method::TestMethodCommand;
pub use setup::{run_setups, run_teardowns, SetUpTearDownCommand};

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::TestFailure;
use crate::models::{CommandDecorator, FailureSite, Outcome, SetUpTearDownLevel, Test, TestResult};

/// One link of the command chain
pub trait TestCommand: Send + Sync {
    fn test(&self) -> &Arc<Test>;

    /// Run with `ctx`, recording into `result`
    ///
    /// Only the innermost command returns failures; every wrapper outside
    /// the result capture returns `Ok`.
    fn execute(&self, ctx: &mut ExecutionContext, result: &mut TestResult) -> Result<(), TestFailure>;
}

/// Build the command chain for a leaf test
///
/// `runnable` is false for tests whose run state forbids running and for
/// explicit tests the filter did not select.
pub fn make_test_command(
    test: &Arc<Test>,
    levels: &[SetUpTearDownLevel],
    runnable: bool,
) -> Arc<dyn TestCommand> {
    if !runnable {
        return Arc::new(SkipCommand::new(Arc::clone(test), test.run_state()));
    }

    let mut command: Arc<dyn TestCommand> = Arc::new(TestMethodCommand::new(Arc::clone(test)));
    command = Arc::new(ResultCaptureCommand::new(command));
    command = Arc::new(SetUpTearDownCommand::new(command, levels.to_vec()));

    for decorator in test.decorators() {
        command = decorator.decorate(command);
    }
    command
}

impl CommandDecorator {
    /// Wrap `command` with the command this decorator describes
    pub fn decorate(&self, command: Arc<dyn TestCommand>) -> Arc<dyn TestCommand> {
        match self {
            CommandDecorator::MaxTime(max) => Arc::new(MaxTimeCommand::new(command, *max)),
            CommandDecorator::Repeat(count) => Arc::new(RepeatCommand::new(command, *count)),
        }
    }
}

/// Run `f`, converting a panic into an `Error` failure
pub fn run_guarded<F>(f: F) -> Result<(), TestFailure>
where
    F: FnOnce() -> Result<(), TestFailure>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => Err(TestFailure::Error(panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "test panicked".to_string()
    }
}

/// Record `failure` on `result` at `site`, prefixing the message
pub fn apply_failure(result: &mut TestResult, failure: &TestFailure, site: FailureSite, prefix: &str) {
    match failure {
        TestFailure::Ignored(reason) => result.set_result(Outcome::Skipped, Some(reason.clone())),
        other => result.set_failure(other.outcome(), site, format!("{prefix}{other}")),
    }
}
