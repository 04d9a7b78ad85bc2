//! Attribute descriptors
//!
//! Static metadata attached to tests when the tree is built. Each attribute
//! either extends the node's property bag, changes its run state, or
//! contributes a command decorator applied by the command pipeline.

use bitflags::bitflags;
use std::time::Duration;

use super::properties::{names, PropertyBag};
use super::test::RunState;

bitflags! {
    /// Which nodes may run in parallel with their siblings
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ParallelScope: u8 {
        /// The node itself
        const SELF = 0b001;
        /// Every descendant of the node
        const CHILDREN = 0b010;
        /// Fixtures below the node
        const FIXTURES = 0b100;
    }
}

/// Command decorators, applied outermost-last-declared
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandDecorator {
    /// Fail a passing test whose elapsed time exceeds the limit
    MaxTime(Duration),
    /// Run the inner chain this many times, stopping at the first non-success
    Repeat(u32),
}

/// Attribute descriptor attached to a test or suite at build time
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attribute {
    Category(String),
    Description(String),
    /// Per-test timeout in milliseconds
    Timeout(u64),
    /// Maximum elapsed time in milliseconds
    MaxTime(u64),
    Repeat(u32),
    /// Operations performed per benchmark sample
    Iterations(u32),
    /// Number of measured benchmark runs, excluding the warm-up run
    BenchCount(u32),
    RequiresThread,
    Parallelizable(ParallelScope),
    LevelOfParallelism(usize),
    Explicit(Option<String>),
    Ignore(String),
}

impl Attribute {
    /// Record the attribute on a node being built
    pub fn apply_to_test(
        &self,
        properties: &mut PropertyBag,
        run_state: &mut RunState,
    ) -> Option<CommandDecorator> {
        match self {
            Attribute::Category(name) => properties.add(names::CATEGORY, name),
            Attribute::Description(text) => properties.set(names::DESCRIPTION, text),
            Attribute::Timeout(ms) => properties.set(names::TIMEOUT, ms),
            Attribute::MaxTime(ms) => {
                properties.set(names::MAX_TIME, ms);
                return Some(CommandDecorator::MaxTime(Duration::from_millis(*ms)));
            }
            Attribute::Repeat(count) => {
                properties.set(names::REPEAT, count);
                return Some(CommandDecorator::Repeat(*count));
            }
            Attribute::Iterations(count) => properties.set(names::ITERATIONS, count),
            Attribute::BenchCount(count) => properties.set(names::BENCH_COUNT, count),
            Attribute::RequiresThread => properties.set(names::REQUIRES_THREAD, true),
            Attribute::Parallelizable(scope) => {
                properties.set(names::PARALLEL_SCOPE, scope.bits())
            }
            Attribute::LevelOfParallelism(level) => {
                properties.set(names::LEVEL_OF_PARALLELISM, level)
            }
            Attribute::Explicit(reason) => {
                if *run_state == RunState::Runnable {
                    *run_state = RunState::Explicit;
                    if let Some(reason) = reason {
                        properties.set(names::SKIP_REASON, reason);
                    }
                }
            }
            Attribute::Ignore(reason) => {
                *run_state = RunState::Ignored;
                properties.set(names::SKIP_REASON, reason);
            }
        }
        None
    }
}
