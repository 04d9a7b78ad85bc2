//! Error types
//!
//! `EngineError` covers faults of the engine itself and is surfaced to the
//! caller of the runner. `TestFailure` is what test bodies and hooks return;
//! it never crosses a work item boundary and is always translated into a
//! result outcome.

use thiserror::Error;

use crate::models::Outcome;

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No test has been loaded")]
    NoTestLoaded,

    #[error("A test run is already in progress")]
    RunInProgress,

    #[error("The context has already been initialized")]
    ContextAlreadyInitialized,

    #[error("Invalid value '{value}' for setting {key}")]
    InvalidSetting { key: String, value: String },

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("Run terminated without reporting a result")]
    RunLost,
}

/// Failure reported by a test body, setup or teardown
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestFailure {
    /// An expectation was violated
    #[error("{0}")]
    Assertion(String),

    /// The unit under test faulted
    #[error("{0}")]
    Error(String),

    /// The test asked to be ignored
    #[error("{0}")]
    Ignored(String),

    /// The test observed a cancellation request
    #[error("Test cancelled")]
    Cancelled,
}

impl TestFailure {
    pub fn assertion(message: impl Into<String>) -> Self {
        TestFailure::Assertion(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        TestFailure::Error(message.into())
    }

    pub fn ignored(reason: impl Into<String>) -> Self {
        TestFailure::Ignored(reason.into())
    }

    /// The result outcome this failure maps to
    pub fn outcome(&self) -> Outcome {
        match self {
            TestFailure::Assertion(_) => Outcome::Failure,
            TestFailure::Error(_) => Outcome::Error,
            TestFailure::Ignored(_) => Outcome::Skipped,
            TestFailure::Cancelled => Outcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_outcomes() {
        assert_eq!(TestFailure::assertion("x").outcome(), Outcome::Failure);
        assert_eq!(TestFailure::error("x").outcome(), Outcome::Error);
        assert_eq!(TestFailure::ignored("x").outcome(), Outcome::Skipped);
        assert_eq!(TestFailure::Cancelled.outcome(), Outcome::Cancelled);
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::InvalidSetting {
            key: "NumberOfWorkers".to_string(),
            value: "many".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value 'many' for setting NumberOfWorkers"
        );
    }
}
