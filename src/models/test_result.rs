//! Test result models
//!
//! A `TestResult` tree mirrors the executed part of the test tree. Leaves
//! carry benchmark statistics; composites carry their aggregated outcome.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::test::Test;
use crate::benchmark::BenchmarkResult;

/// Final outcome of a test node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Success,
    Failure,
    Error,
    Skipped,
    Cancelled,
}

impl Outcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Success => "✓",
            Outcome::Failure => "✗",
            Outcome::Error => "!",
            Outcome::Skipped => "○",
            Outcome::Cancelled => "-",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Failure or Error
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure | Outcome::Error)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "PASS"),
            Outcome::Failure => write!(f, "FAIL"),
            Outcome::Error => write!(f, "ERROR"),
            Outcome::Skipped => write!(f, "SKIP"),
            Outcome::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Where a non-success outcome originated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FailureSite {
    Test,
    SetUp,
    TearDown,
    Parent,
    Child,
}

/// Result of one test node
#[derive(Clone, Debug, Serialize)]
pub struct TestResult {
    #[serde(serialize_with = "serialize_test")]
    pub test: Arc<Test>,
    pub outcome: Outcome,
    pub site: Option<FailureSite>,
    pub message: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
    pub assert_count: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TestResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub benchmark_results: Vec<BenchmarkResult>,
}

fn serialize_test<S: Serializer>(test: &Arc<Test>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("Test", 3)?;
    state.serialize_field("id", test.id())?;
    state.serialize_field("name", test.name())?;
    state.serialize_field("full_name", test.full_name())?;
    state.end()
}

fn serialize_duration_ms<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64() * 1000.0)
}

impl TestResult {
    /// A result not yet executed; outcome is Skipped until set
    pub fn new(test: Arc<Test>) -> Self {
        Self {
            test,
            outcome: Outcome::Skipped,
            site: None,
            message: None,
            start_time: Utc::now(),
            duration: Duration::ZERO,
            assert_count: 0,
            children: Vec::new(),
            benchmark_results: Vec::new(),
        }
    }

    pub fn set_result(&mut self, outcome: Outcome, message: Option<String>) {
        self.outcome = outcome;
        self.message = message;
        self.site = None;
    }

    pub fn set_failure(&mut self, outcome: Outcome, site: FailureSite, message: impl Into<String>) {
        self.outcome = outcome;
        self.site = Some(site);
        self.message = Some(message.into());
    }

    /// Record a teardown failure without hiding an earlier failure
    pub fn record_teardown_failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        match self.outcome {
            Outcome::Success | Outcome::Skipped => {
                self.set_failure(Outcome::Error, FailureSite::TearDown, message);
            }
            _ => {
                self.message = Some(match self.message.take() {
                    Some(existing) => format!("{existing}\n{message}"),
                    None => message,
                });
            }
        }
    }

    pub fn name(&self) -> &str {
        self.test.name()
    }

    pub fn full_name(&self) -> &str {
        self.test.full_name()
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }

    /// Depth-first iterator over this result and its descendants
    pub fn iter(&self) -> impl Iterator<Item = &TestResult> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    /// Find a descendant (or self) by full name
    pub fn find(&self, full_name: &str) -> Option<&TestResult> {
        self.iter().find(|r| r.full_name() == full_name)
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary::new(self)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{:.0}ms]",
            self.outcome.symbol(),
            self.full_name(),
            self.duration_ms()
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Leaf counts of a result tree
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResultSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub assert_count: u32,
    pub duration_ms: f64,
}

impl ResultSummary {
    pub fn new(root: &TestResult) -> Self {
        let mut summary = Self {
            assert_count: root.assert_count,
            duration_ms: root.duration_ms(),
            ..Default::default()
        };

        for leaf in root.iter().filter(|r| !r.test.is_suite()) {
            summary.total += 1;
            match leaf.outcome {
                Outcome::Success => summary.passed += 1,
                Outcome::Failure => summary.failed += 1,
                Outcome::Error => summary.errors += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed + self.errors > 0
    }
}

impl fmt::Display for ResultSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Error: {} | Skip: {} | Cancelled: {}",
            self.total, self.passed, self.failed, self.errors, self.skipped, self.cancelled
        )?;
        write!(
            f,
            "Pass Rate: {:.1}% | Asserts: {} | Duration: {:.0}ms",
            self.pass_rate(),
            self.assert_count,
            self.duration_ms
        )
    }
}
