//! Innermost command: invoke the test body

use std::sync::Arc;
use tracing::trace;

use super::TestCommand;
use crate::benchmark::calculate_results;
use crate::context::ExecutionContext;
use crate::error::TestFailure;
use crate::models::{Outcome, Test, TestKind, TestResult};

/// Invokes the body of a test method
///
/// Benchmark methods run `bench_count + 1` times; the first run is a
/// warm-up whose samples the statistics discard. Failures propagate to the
/// enclosing result capture.
pub struct TestMethodCommand {
    test: Arc<Test>,
}

impl TestMethodCommand {
    pub fn new(test: Arc<Test>) -> Self {
        Self { test }
    }
}

impl TestCommand for TestMethodCommand {
    fn test(&self) -> &Arc<Test> {
        &self.test
    }

    fn execute(&self, ctx: &mut ExecutionContext, result: &mut TestResult) -> Result<(), TestFailure> {
        let TestKind::Method { body, benchmark, .. } = self.test.kind() else {
            return Err(TestFailure::error(format!(
                "{} is not a test method",
                self.test.full_name()
            )));
        };

        ctx.clear_samples();
        let iterations = self.test.iterations();
        ctx.set_iterations(iterations);

        if *benchmark {
            let total = ctx.bench_count() + 1;
            let listener = Arc::clone(ctx.listener());
            trace!(test = self.test.full_name(), runs = total, "Running benchmark loop");

            for i in 0..total {
                ctx.checkpoint()?;
                listener.benchmark_iteration_started(&self.test, i, total);
                let outcome = body(ctx);
                listener.benchmark_iteration_finished(&self.test, i, total);
                outcome?;
            }
            result.benchmark_results = calculate_results(ctx.samples(), iterations);
        } else {
            ctx.checkpoint()?;
            body(ctx)?;
        }

        result.set_result(Outcome::Success, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context_for;
    use crate::executor::SequentialDispatcher;
    use crate::listener::{ListenerEvent, RecordingListener};
    use crate::models::{Attribute, MethodBuilder, SuiteBuilder};

    #[test]
    fn test_benchmark_loop_runs_warm_up_plus_count() {
        let fixture = SuiteBuilder::fixture("F")
            .attribute(Attribute::BenchCount(3))
            .test(
                MethodBuilder::bench("Sum", |ctx| {
                    let n = ctx.iterations().unwrap_or(1);
                    ctx.measure("sum", || (0..n).sum::<u32>());
                    Ok(())
                })
                .attribute(Attribute::Iterations(100)),
            )
            .build();
        let leaf = &fixture.children()[0];

        let listener = Arc::new(RecordingListener::new());
        let mut ctx = ExecutionContext::new(listener.clone(), Arc::new(SequentialDispatcher::new()))
            .for_test(&fixture)
            .for_test(leaf);
        let mut result = TestResult::new(Arc::clone(leaf));

        TestMethodCommand::new(Arc::clone(leaf))
            .execute(&mut ctx, &mut result)
            .unwrap();

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(ctx.samples().len(), 4);
        assert_eq!(result.benchmark_results.len(), 1);
        assert_eq!(result.benchmark_results[0].count, 3);
        assert_eq!(result.benchmark_results[0].iterations_per_sample, Some(100));

        let iterations: Vec<_> = listener
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::IterationStarted(_, i, total) => Some((i, total)),
                _ => None,
            })
            .collect();
        assert_eq!(iterations, [(0, 4), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn test_plain_method_runs_once() {
        let leaf = MethodBuilder::new("Once", |ctx| ctx.assert_that(true, "ok")).build();
        let mut ctx = context_for(&leaf);
        let mut result = TestResult::new(Arc::clone(&leaf));

        TestMethodCommand::new(Arc::clone(&leaf))
            .execute(&mut ctx, &mut result)
            .unwrap();

        assert_eq!(ctx.assert_count(), 1);
        assert!(result.benchmark_results.is_empty());
    }

    #[test]
    fn test_failure_propagates() {
        let leaf = MethodBuilder::bench("Fails", |_| Err(TestFailure::assertion("bad"))).build();
        let mut ctx = context_for(&leaf);
        let mut result = TestResult::new(Arc::clone(&leaf));

        let err = TestMethodCommand::new(Arc::clone(&leaf))
            .execute(&mut ctx, &mut result)
            .unwrap_err();

        assert_eq!(err, TestFailure::assertion("bad"));
        assert_eq!(result.outcome, Outcome::Skipped);
    }
}
