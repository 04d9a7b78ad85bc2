//! Data models for the execution engine
//!
//! The test tree, its metadata, and the result tree produced by a run.

mod attributes;
mod params;
mod properties;
mod test;
mod test_result;

pub use attributes::{Attribute, CommandDecorator, ParallelScope};
pub use params::{case_name, CombiningStrategy};
pub use properties::{names, PropertyBag};
pub use test::{
    MethodBuilder, NamedHook, ParameterizedBody, RunState, SetUpTearDownLevel, SuiteBuilder,
    SuiteKind, Test, TestBody, TestKind,
};
pub use test_result::{FailureSite, Outcome, ResultSummary, TestResult};
