//! Output formatters for result trees
//!
//! Provides table, JSON, and summary output formats.

use std::fmt::Write as _;
use std::io::Write;
use std::str::FromStr;

use crate::models::{Outcome, ResultSummary, TestResult};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            "summary" => Ok(OutputFormat::Summary),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a whole result tree
    pub fn format_result(&self, result: &TestResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_tree(result),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Summary => self.format_summary_brief(&result.summary()),
        }
    }

    /// Colored outcome label
    pub fn status(&self, outcome: Outcome) -> String {
        let label = format!("{} {}", outcome.symbol(), outcome);
        if !self.colorize {
            return label;
        }
        let color = match outcome {
            Outcome::Success => "32",
            Outcome::Failure | Outcome::Error => "31",
            Outcome::Skipped | Outcome::Cancelled => "33",
        };
        format!("\x1b[{color}m{label}\x1b[0m")
    }

    fn format_tree(&self, root: &TestResult) -> String {
        let mut output = String::new();
        self.write_node(&mut output, root, 0);
        output.push_str(&self.format_summary_table(&root.summary()));
        output
    }

    fn write_node(&self, output: &mut String, result: &TestResult, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(
            output,
            "{indent}{:<40} {} [{:>9.2}ms]",
            result.name(),
            self.status(result.outcome),
            result.duration_ms()
        );

        if let Some(message) = &result.message {
            for line in message.lines() {
                let _ = writeln!(output, "{indent}    {line}");
            }
        }
        for bench in &result.benchmark_results {
            let _ = writeln!(output, "{indent}    {}:{}", bench.name, bench.format_summary());
        }
        for child in &result.children {
            self.write_node(output, child, depth + 1);
        }
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &ResultSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_table(&self, summary: &ResultSummary) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{:3}\x1b[0m", summary.passed)
        } else {
            format!("{:3}", summary.passed)
        };
        let fail_str = if self.colorize && summary.failed > 0 {
            format!("\x1b[31m{:3}\x1b[0m", summary.failed)
        } else {
            format!("{:3}", summary.failed)
        };

        let _ = writeln!(
            output,
            "║  Total: {:3} | Pass: {} | Fail: {} | Error: {:3} | Skip: {:3}  ║",
            summary.total, pass_str, fail_str, summary.errors, summary.skipped
        );
        let _ = writeln!(
            output,
            "║  Pass Rate: {:5.1}% | Asserts: {:5} | Duration: {:8.1}ms    ║",
            summary.pass_rate(),
            summary.assert_count,
            summary.duration_ms
        );
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_summary_brief(&self, summary: &ResultSummary) -> String {
        let mut line = format!(
            "{}/{} passed ({:.1}%) in {:.1}ms",
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.duration_ms
        );
        if summary.failed + summary.errors > 0 {
            let _ = write!(line, ", {} failed, {} errors", summary.failed, summary.errors);
        }
        if summary.cancelled > 0 {
            let _ = write!(line, ", {} cancelled", summary.cancelled);
        }
        line
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Write a result tree to a file
pub fn write_results_to_file(path: &str, result: &TestResult, format: OutputFormat) -> anyhow::Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_result(result);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TestFailure;
    use crate::executor::TestRunner;
    use crate::config::RunSettings;
    use crate::filter::TestFilter;
    use crate::listener::NullListener;
    use crate::models::{MethodBuilder, SuiteBuilder};
    use std::sync::Arc;

    fn sample_result() -> TestResult {
        let root = SuiteBuilder::fixture("Calc")
            .test(MethodBuilder::new("Adds", |_| Ok(())))
            .test(MethodBuilder::new("Divides", |_| Err(TestFailure::assertion("division by zero"))))
            .build();
        let mut runner = TestRunner::new(RunSettings::default());
        runner.load(root);
        runner.run(Arc::new(NullListener), &TestFilter::Empty).unwrap()
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("TABLE".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_table_lists_every_node() {
        let output = ResultFormatter::new(OutputFormat::Table).no_color().format_result(&sample_result());

        assert!(output.contains("Calc"));
        assert!(output.contains("✓ PASS"));
        assert!(output.contains("✗ FAIL"));
        assert!(output.contains("division by zero"));
        assert!(output.contains("Total:   2"));
    }

    #[test]
    fn test_json_output() {
        let output = ResultFormatter::new(OutputFormat::Json).format_result(&sample_result());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["outcome"], "Failure");
        assert_eq!(value["children"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_summary_line() {
        let output = ResultFormatter::new(OutputFormat::Summary).format_result(&sample_result());
        assert!(output.starts_with("1/2 passed (50.0%)"));
        assert!(output.contains("1 failed"));
    }

    #[test]
    fn test_write_results_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let path = path.to_str().unwrap();

        write_results_to_file(path, &sample_result(), OutputFormat::JsonPretty).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("\"Calc.Divides\""));
    }
}
