//! Console listener
//!
//! Prints the tree as it runs: suites as headers, leaves with their
//! outcome when they finish, benchmark progress as one `*` per iteration.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

use super::ResultFormatter;
use crate::listener::TestListener;
use crate::models::{Test, TestResult};

struct ConsoleState {
    depth: usize,
    out: Box<dyn Write + Send>,
}

pub struct ConsoleListener {
    state: Mutex<ConsoleState>,
    formatter: ResultFormatter,
}

impl ConsoleListener {
    /// Listener printing to stdout
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()), true)
    }

    pub fn new(out: Box<dyn Write + Send>, colorize: bool) -> Self {
        let formatter = ResultFormatter::default();
        Self {
            state: Mutex::new(ConsoleState { depth: 0, out }),
            formatter: if colorize { formatter } else { formatter.no_color() },
        }
    }
}

impl TestListener for ConsoleListener {
    fn test_started(&self, test: &Arc<Test>) {
        if !test.is_suite() {
            return;
        }
        let mut state = self.state.lock();
        let indent = "  ".repeat(state.depth);
        let _ = writeln!(state.out, "{indent}{}", test.name());
        state.depth += 1;
    }

    fn test_finished(&self, result: &TestResult) {
        let mut state = self.state.lock();
        if result.test.is_suite() {
            state.depth = state.depth.saturating_sub(1);
            return;
        }

        let indent = "  ".repeat(state.depth);
        let _ = writeln!(
            state.out,
            "{indent}{} {} ({:.2}ms)",
            self.formatter.status(result.outcome),
            result.name(),
            result.duration_ms()
        );
        if let Some(message) = result.message.as_deref().filter(|_| !result.outcome.is_success()) {
            for line in message.lines() {
                let _ = writeln!(state.out, "{indent}    {line}");
            }
        }
        for bench in &result.benchmark_results {
            let _ = writeln!(state.out, "{indent}    {}:{}", bench.name, bench.format_summary());
        }
        let _ = state.out.flush();
    }

    fn benchmark_iteration_started(&self, test: &Arc<Test>, iteration: u32, _total: u32) {
        if iteration == 0 {
            let mut state = self.state.lock();
            let indent = "  ".repeat(state.depth);
            let _ = write!(state.out, "{indent}{} ", test.name());
        }
    }

    fn benchmark_iteration_finished(&self, _test: &Arc<Test>, iteration: u32, total: u32) {
        let mut state = self.state.lock();
        let _ = write!(state.out, "*");
        if iteration + 1 == total {
            let _ = writeln!(state.out);
        }
        let _ = state.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunSettings;
    use crate::executor::TestRunner;
    use crate::filter::TestFilter;
    use crate::models::{Attribute, MethodBuilder, SuiteBuilder};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_prints_indented_tree_with_benchmarks() {
        let root = SuiteBuilder::fixture("Strings")
            .attribute(Attribute::BenchCount(2))
            .test(MethodBuilder::new("Upper", |ctx| ctx.assert_eq("A", "a").map(|_| ())))
            .test(MethodBuilder::bench("Concat", |ctx| {
                ctx.measure("concat", || "a".repeat(64));
                Ok(())
            }))
            .build();
        let buffer = SharedBuffer::default();
        let listener = Arc::new(ConsoleListener::new(Box::new(buffer.clone()), false));
        let mut runner = TestRunner::new(RunSettings::default());
        runner.load(root);

        runner.run(listener, &TestFilter::Empty).unwrap();

        let text = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Strings");
        assert!(lines[1].starts_with("  ✗ FAIL Upper"));
        assert!(text.contains("  Concat ***\n"));
        assert!(text.contains("    concat: Mean="));
    }
}
