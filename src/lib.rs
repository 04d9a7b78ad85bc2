//! benchsuite - test and benchmark execution engine
//!
//! Runs a tree of suites, fixtures and test methods through a command
//! pipeline, sequentially or on a worker pool, and reports a result tree
//! with pass/fail outcomes and benchmark statistics.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use benchsuite::config::RunSettings;
//! use benchsuite::executor::TestRunner;
//! use benchsuite::filter::TestFilter;
//! use benchsuite::listener::NullListener;
//! use benchsuite::models::{MethodBuilder, SuiteBuilder};
//!
//! let root = SuiteBuilder::fixture("Math")
//!     .test(MethodBuilder::new("Adds", |ctx| ctx.assert_eq(4, 2 + 2)))
//!     .build();
//!
//! let mut runner = TestRunner::new(RunSettings::default());
//! runner.load(root);
//! let result = runner.run(Arc::new(NullListener), &TestFilter::Empty)?;
//! println!("{}", result.summary());
//! # Ok::<(), benchsuite::error::EngineError>(())
//! ```

pub mod benchmark;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod demo;
pub mod error;
pub mod executor;
pub mod filter;
pub mod listener;
pub mod models;
pub mod output;
pub mod utils;

pub use error::{EngineError, TestFailure};
pub use executor::{RunHandle, TestRunner};
pub use models::{Outcome, Test, TestResult};
