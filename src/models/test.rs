//! Test tree model
//!
//! The tree is assembled once with [`SuiteBuilder`] / [`MethodBuilder`] and is
//! read-only afterwards. Nodes are shared across worker threads as `Arc<Test>`.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::attributes::{Attribute, CommandDecorator, ParallelScope};
use super::params::{case_name, CombiningStrategy};
use super::properties::{names, PropertyBag};
use crate::context::ExecutionContext;
use crate::error::TestFailure;

/// Body of a test method, setup or teardown hook
pub type TestBody = Arc<dyn Fn(&mut ExecutionContext) -> Result<(), TestFailure> + Send + Sync>;

/// Body of a parameterized method, receiving the case's arguments
pub type ParameterizedBody =
    Arc<dyn Fn(&mut ExecutionContext, &[Value]) -> Result<(), TestFailure> + Send + Sync>;

/// Whether and how a node may run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RunState {
    Runnable,
    Skipped,
    Ignored,
    /// Runs only when selected by a non-empty filter
    Explicit,
    /// Discovery could not prepare the node
    NotRunnable,
}

impl RunState {
    pub fn is_runnable(&self) -> bool {
        matches!(self, RunState::Runnable | RunState::Explicit)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Runnable => "Runnable",
            RunState::Skipped => "Skipped",
            RunState::Ignored => "Ignored",
            RunState::Explicit => "Explicit",
            RunState::NotRunnable => "NotRunnable",
        };
        f.write_str(s)
    }
}

/// Kind of grouping a suite represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SuiteKind {
    Namespace,
    Fixture,
    ParameterizedMethod,
}

/// A named setup or teardown hook
#[derive(Clone)]
pub struct NamedHook {
    pub name: String,
    pub hook: TestBody,
}

impl fmt::Debug for NamedHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedHook").field("name", &self.name).finish()
    }
}

/// Setup and teardown hooks declared at one level of a fixture hierarchy
///
/// Levels are listed most-base first. Setups run base to derived, teardowns
/// derived to base.
#[derive(Clone, Debug, Default)]
pub struct SetUpTearDownLevel {
    name: String,
    setups: Vec<NamedHook>,
    teardowns: Vec<NamedHook>,
}

impl SetUpTearDownLevel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn setup<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.setups.push(NamedHook {
            name: name.into(),
            hook: Arc::new(hook),
        });
        self
    }

    pub fn teardown<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.teardowns.push(NamedHook {
            name: name.into(),
            hook: Arc::new(hook),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn setups(&self) -> &[NamedHook] {
        &self.setups
    }

    pub fn teardowns(&self) -> &[NamedHook] {
        &self.teardowns
    }

    pub fn has_methods(&self) -> bool {
        !self.setups.is_empty() || !self.teardowns.is_empty()
    }
}

/// Node payload
pub enum TestKind {
    Suite {
        kind: SuiteKind,
        children: Vec<Arc<Test>>,
        one_time: Vec<SetUpTearDownLevel>,
        per_test: Vec<SetUpTearDownLevel>,
    },
    Method {
        body: TestBody,
        benchmark: bool,
        decorators: Vec<CommandDecorator>,
    },
}

/// A node of the test tree
pub struct Test {
    id: String,
    name: String,
    full_name: String,
    run_state: RunState,
    properties: PropertyBag,
    kind: TestKind,
}

impl Test {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.properties.get(names::SKIP_REASON)
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn kind(&self) -> &TestKind {
        &self.kind
    }

    pub fn is_suite(&self) -> bool {
        matches!(self.kind, TestKind::Suite { .. })
    }

    pub fn suite_kind(&self) -> Option<SuiteKind> {
        match &self.kind {
            TestKind::Suite { kind, .. } => Some(*kind),
            TestKind::Method { .. } => None,
        }
    }

    pub fn is_fixture(&self) -> bool {
        self.suite_kind() == Some(SuiteKind::Fixture)
    }

    pub fn children(&self) -> &[Arc<Test>] {
        match &self.kind {
            TestKind::Suite { children, .. } => children,
            TestKind::Method { .. } => &[],
        }
    }

    pub fn one_time_levels(&self) -> &[SetUpTearDownLevel] {
        match &self.kind {
            TestKind::Suite { one_time, .. } => one_time,
            TestKind::Method { .. } => &[],
        }
    }

    pub fn per_test_levels(&self) -> &[SetUpTearDownLevel] {
        match &self.kind {
            TestKind::Suite { per_test, .. } => per_test,
            TestKind::Method { .. } => &[],
        }
    }

    pub fn is_benchmark(&self) -> bool {
        matches!(self.kind, TestKind::Method { benchmark: true, .. })
    }

    pub fn decorators(&self) -> &[CommandDecorator] {
        match &self.kind {
            TestKind::Method { decorators, .. } => decorators,
            TestKind::Suite { .. } => &[],
        }
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.properties.get_parsed(names::TIMEOUT)
    }

    pub fn requires_thread(&self) -> bool {
        self.properties
            .get_parsed(names::REQUIRES_THREAD)
            .unwrap_or(false)
    }

    pub fn parallel_scope(&self) -> Option<ParallelScope> {
        self.properties
            .get_parsed::<u8>(names::PARALLEL_SCOPE)
            .map(ParallelScope::from_bits_truncate)
    }

    pub fn level_of_parallelism(&self) -> Option<usize> {
        self.properties.get_parsed(names::LEVEL_OF_PARALLELISM)
    }

    pub fn iterations(&self) -> Option<u32> {
        self.properties.get_parsed(names::ITERATIONS)
    }

    pub fn bench_count(&self) -> Option<u32> {
        self.properties.get_parsed(names::BENCH_COUNT)
    }

    pub fn categories(&self) -> &[String] {
        self.properties.get_all(names::CATEGORY)
    }

    /// Number of leaf tests at or below this node
    pub fn test_case_count(&self) -> usize {
        if self.is_suite() {
            self.children().iter().map(|c| c.test_case_count()).sum()
        } else {
            1
        }
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("id", &self.id)
            .field("full_name", &self.full_name)
            .field("run_state", &self.run_state)
            .field("is_suite", &self.is_suite())
            .field("children", &self.children().len())
            .finish()
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

#[derive(Default)]
struct IdGenerator {
    next: u32,
}

impl IdGenerator {
    fn next_id(&mut self) -> String {
        let id = format!("0-{}", 1000 + self.next);
        self.next += 1;
        id
    }
}

fn qualify(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}

fn node_properties(
    attributes: &[Attribute],
    mut run_state: RunState,
    reason: Option<&str>,
) -> (PropertyBag, RunState, Vec<CommandDecorator>) {
    let mut properties = PropertyBag::new();
    if let Some(reason) = reason {
        properties.set(names::SKIP_REASON, reason);
    }

    let decorators = attributes
        .iter()
        .filter_map(|a| a.apply_to_test(&mut properties, &mut run_state))
        .collect();

    (properties, run_state, decorators)
}

/// Builder for a leaf test method
pub struct MethodBuilder {
    name: String,
    body: TestBody,
    benchmark: bool,
    attributes: Vec<Attribute>,
    run_state: RunState,
    reason: Option<String>,
}

impl MethodBuilder {
    /// A plain test method, run once
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        Self::from_body(name, Arc::new(body))
    }

    /// A benchmark method, run once per measured sample plus a warm-up run
    pub fn bench<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        Self::from_body(name, Arc::new(body)).benchmark()
    }

    pub fn from_body(name: impl Into<String>, body: TestBody) -> Self {
        Self {
            name: name.into(),
            body,
            benchmark: false,
            attributes: Vec::new(),
            run_state: RunState::Runnable,
            reason: None,
        }
    }

    pub fn benchmark(mut self) -> Self {
        self.benchmark = true;
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.run_state = RunState::Skipped;
        self.reason = Some(reason.into());
        self
    }

    pub fn not_runnable(mut self, reason: impl Into<String>) -> Self {
        self.run_state = RunState::NotRunnable;
        self.reason = Some(reason.into());
        self
    }

    /// Build a standalone method as the root of a tree
    pub fn build(self) -> Arc<Test> {
        self.build_node(None, &mut IdGenerator::default())
    }

    fn build_node(self, parent: Option<&str>, ids: &mut IdGenerator) -> Arc<Test> {
        let (properties, run_state, decorators) =
            node_properties(&self.attributes, self.run_state, self.reason.as_deref());

        Arc::new(Test {
            id: ids.next_id(),
            full_name: qualify(parent, &self.name),
            name: self.name,
            run_state,
            properties,
            kind: TestKind::Method {
                body: self.body,
                benchmark: self.benchmark,
                decorators,
            },
        })
    }
}

enum NodeBuilder {
    Suite(SuiteBuilder),
    Method(MethodBuilder),
}

impl NodeBuilder {
    fn build_node(self, parent: Option<&str>, ids: &mut IdGenerator) -> Arc<Test> {
        match self {
            NodeBuilder::Suite(suite) => suite.build_node(parent, ids),
            NodeBuilder::Method(method) => method.build_node(parent, ids),
        }
    }
}

/// Builder for a suite (namespace, fixture or parameterized method)
pub struct SuiteBuilder {
    name: String,
    kind: SuiteKind,
    attributes: Vec<Attribute>,
    children: Vec<NodeBuilder>,
    one_time: Vec<SetUpTearDownLevel>,
    per_test: Vec<SetUpTearDownLevel>,
    run_state: RunState,
    reason: Option<String>,
}

impl SuiteBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, SuiteKind::Namespace)
    }

    pub fn fixture(name: impl Into<String>) -> Self {
        Self::with_kind(name, SuiteKind::Fixture)
    }

    /// A suite of generated cases, one per argument list produced by `strategy`
    pub fn parameterized<F>(
        name: impl Into<String>,
        strategy: CombiningStrategy,
        sources: Vec<Vec<Value>>,
        body: F,
    ) -> Self
    where
        F: Fn(&mut ExecutionContext, &[Value]) -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        let name = name.into();
        let body: ParameterizedBody = Arc::new(body);
        let mut suite = Self::with_kind(name.clone(), SuiteKind::ParameterizedMethod);

        for args in strategy.combine(&sources) {
            let case = case_name(&name, &args);
            let body = Arc::clone(&body);
            suite.children.push(NodeBuilder::Method(MethodBuilder::new(
                case,
                move |ctx: &mut ExecutionContext| body(ctx, &args),
            )));
        }
        suite
    }

    fn with_kind(name: impl Into<String>, kind: SuiteKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes: Vec::new(),
            children: Vec::new(),
            one_time: Vec::new(),
            per_test: Vec::new(),
            run_state: RunState::Runnable,
            reason: None,
        }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn suite(mut self, child: SuiteBuilder) -> Self {
        self.children.push(NodeBuilder::Suite(child));
        self
    }

    pub fn test(mut self, child: MethodBuilder) -> Self {
        self.children.push(NodeBuilder::Method(child));
        self
    }

    /// Apply `f` to every method directly below this suite
    pub fn each_case(mut self, f: impl Fn(MethodBuilder) -> MethodBuilder) -> Self {
        self.children = self
            .children
            .into_iter()
            .map(|child| match child {
                NodeBuilder::Method(method) => NodeBuilder::Method(f(method)),
                suite => suite,
            })
            .collect();
        self
    }

    /// Per-test setup/teardown level; call base level first
    pub fn level(mut self, level: SetUpTearDownLevel) -> Self {
        self.per_test.push(level);
        self
    }

    /// One-time setup/teardown level; call base level first
    pub fn one_time_level(mut self, level: SetUpTearDownLevel) -> Self {
        self.one_time.push(level);
        self
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.run_state = RunState::Skipped;
        self.reason = Some(reason.into());
        self
    }

    pub fn not_runnable(mut self, reason: impl Into<String>) -> Self {
        self.run_state = RunState::NotRunnable;
        self.reason = Some(reason.into());
        self
    }

    pub fn build(self) -> Arc<Test> {
        self.build_node(None, &mut IdGenerator::default())
    }

    fn build_node(self, parent: Option<&str>, ids: &mut IdGenerator) -> Arc<Test> {
        let id = ids.next_id();
        let full_name = qualify(parent, &self.name);
        let (properties, run_state, _) =
            node_properties(&self.attributes, self.run_state, self.reason.as_deref());

        let children = self
            .children
            .into_iter()
            .map(|child| child.build_node(Some(&full_name), ids))
            .collect();

        let one_time = self.one_time.into_iter().filter(|l| l.has_methods()).collect();
        let per_test = self.per_test.into_iter().filter(|l| l.has_methods()).collect();

        Arc::new(Test {
            id,
            name: self.name,
            full_name,
            run_state,
            properties,
            kind: TestKind::Suite {
                kind: self.kind,
                children,
                one_time,
                per_test,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pass(_: &mut ExecutionContext) -> Result<(), TestFailure> {
        Ok(())
    }

    fn sample_tree() -> Arc<Test> {
        SuiteBuilder::new("Root")
            .suite(
                SuiteBuilder::fixture("Math")
                    .attribute(Attribute::Category("fast".into()))
                    .test(MethodBuilder::new("Add", pass))
                    .test(
                        MethodBuilder::bench("Loop", pass)
                            .attribute(Attribute::Iterations(100))
                            .attribute(Attribute::MaxTime(50)),
                    ),
            )
            .test(MethodBuilder::new("Standalone", pass).skipped("not today"))
            .build()
    }

    #[test]
    fn test_full_names_and_ids() {
        let root = sample_tree();
        let math = &root.children()[0];

        assert_eq!(root.full_name(), "Root");
        assert_eq!(math.full_name(), "Root.Math");
        assert_eq!(math.children()[1].full_name(), "Root.Math.Loop");
        assert_eq!(root.id(), "0-1000");
        assert_eq!(math.id(), "0-1001");
        assert_eq!(root.children()[1].id(), "0-1004");
    }

    #[test]
    fn test_node_accessors() {
        let root = sample_tree();
        let math = &root.children()[0];
        let bench = &math.children()[1];

        assert!(root.is_suite());
        assert!(math.is_fixture());
        assert_eq!(math.categories(), ["fast"]);
        assert!(bench.is_benchmark());
        assert_eq!(bench.iterations(), Some(100));
        assert_eq!(bench.decorators().len(), 1);
        assert_eq!(root.test_case_count(), 3);

        let standalone = &root.children()[1];
        assert_eq!(standalone.run_state(), RunState::Skipped);
        assert_eq!(standalone.skip_reason(), Some("not today"));
    }

    #[test]
    fn test_parameterized_cases() {
        let suite = SuiteBuilder::parameterized(
            "Add",
            CombiningStrategy::Combinatorial,
            vec![vec![json!(1), json!(2)], vec![json!(10)]],
            |_, _| Ok(()),
        )
        .each_case(|case| case.attribute(Attribute::Category("param".into())))
        .build();

        assert_eq!(suite.suite_kind(), Some(SuiteKind::ParameterizedMethod));
        let names: Vec<_> = suite.children().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["Add(1,10)", "Add(2,10)"]);
        assert_eq!(suite.children()[0].categories(), ["param"]);
    }

    #[test]
    fn test_empty_levels_are_dropped() {
        let fixture = SuiteBuilder::fixture("F")
            .level(SetUpTearDownLevel::new("Base"))
            .level(SetUpTearDownLevel::new("Derived").setup("Init", pass))
            .build();

        assert_eq!(fixture.per_test_levels().len(), 1);
        assert_eq!(fixture.per_test_levels()[0].name(), "Derived");
    }
}
