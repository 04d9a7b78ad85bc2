//! Result capture: the boundary where failures become outcomes

use std::sync::Arc;

use super::{apply_failure, run_guarded, TestCommand};
use crate::context::ExecutionContext;
use crate::error::TestFailure;
use crate::models::{FailureSite, Test, TestResult};

pub struct ResultCaptureCommand {
    inner: Arc<dyn TestCommand>,
}

impl ResultCaptureCommand {
    pub fn new(inner: Arc<dyn TestCommand>) -> Self {
        Self { inner }
    }
}

impl TestCommand for ResultCaptureCommand {
    fn test(&self) -> &Arc<Test> {
        self.inner.test()
    }

    fn execute(&self, ctx: &mut ExecutionContext, result: &mut TestResult) -> Result<(), TestFailure> {
        if let Err(failure) = run_guarded(|| self.inner.execute(ctx, result)) {
            apply_failure(result, &failure, FailureSite::Test, "");
        }
        Ok(())
    }
}
