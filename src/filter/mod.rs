//! Test filters
//!
//! Boolean predicates over test nodes. Primitive filters match a node when
//! the node itself or one of its ancestors satisfies them, so selecting a
//! suite selects everything below it. A node passes when it matches or
//! when any of its descendants does.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::models::Test;

type PredicateFn = Arc<dyn Fn(&Test) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub enum TestFilter {
    /// Matches everything
    #[default]
    Empty,
    /// Exact full name
    FullName(String),
    /// Any of the listed categories
    Categories(Vec<String>),
    /// Any of the listed test ids
    Ids(HashSet<String>),
    Predicate(PredicateFn),
    And(Vec<TestFilter>),
    Or(Vec<TestFilter>),
    Not(Box<TestFilter>),
}

impl TestFilter {
    pub fn full_name(name: impl Into<String>) -> Self {
        TestFilter::FullName(name.into())
    }

    pub fn category(name: impl Into<String>) -> Self {
        TestFilter::Categories(vec![name.into()])
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TestFilter::Ids(ids.into_iter().map(Into::into).collect())
    }

    pub fn predicate(f: impl Fn(&Test) -> bool + Send + Sync + 'static) -> Self {
        TestFilter::Predicate(Arc::new(f))
    }

    pub fn and(self, other: TestFilter) -> Self {
        TestFilter::And(vec![self, other])
    }

    pub fn or(self, other: TestFilter) -> Self {
        TestFilter::Or(vec![self, other])
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        TestFilter::Not(Box::new(self))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TestFilter::Empty)
    }

    /// Primitive match against `test` alone
    fn matches_node(&self, test: &Test) -> bool {
        match self {
            TestFilter::Empty => true,
            TestFilter::FullName(name) => test.full_name() == name,
            TestFilter::Categories(wanted) => {
                test.categories().iter().any(|c| wanted.contains(c))
            }
            TestFilter::Ids(ids) => ids.contains(test.id()),
            TestFilter::Predicate(f) => f(test),
            TestFilter::And(_) | TestFilter::Or(_) | TestFilter::Not(_) => false,
        }
    }

    /// Whether `test`, located below `ancestors` (root first), matches
    pub fn is_match(&self, test: &Test, ancestors: &[&Test]) -> bool {
        match self {
            TestFilter::And(filters) => filters.iter().all(|f| f.is_match(test, ancestors)),
            TestFilter::Or(filters) => filters.iter().any(|f| f.is_match(test, ancestors)),
            TestFilter::Not(inner) => !inner.is_match(test, ancestors),
            primitive => {
                primitive.matches_node(test) || ancestors.iter().any(|a| primitive.matches_node(a))
            }
        }
    }

    /// Whether the filter selects `test` by inclusion rather than by
    /// exclusion; explicit tests run only on such a match
    ///
    /// `Not` never selects. `And` selects when every part matches and at
    /// least one part selects.
    pub fn is_explicit_match(&self, test: &Test, ancestors: &[&Test]) -> bool {
        match self {
            TestFilter::Empty | TestFilter::Not(_) => false,
            TestFilter::And(filters) => {
                filters.iter().all(|f| f.is_match(test, ancestors))
                    && filters.iter().any(|f| f.is_explicit_match(test, ancestors))
            }
            TestFilter::Or(filters) => filters.iter().any(|f| f.is_explicit_match(test, ancestors)),
            primitive => primitive.is_match(test, ancestors),
        }
    }

    /// Whether `test` belongs in the filtered tree
    pub fn pass(&self, test: &Test, ancestors: &[&Test]) -> bool {
        if self.is_empty() || self.is_match(test, ancestors) {
            return true;
        }

        let mut path = ancestors.to_vec();
        path.push(test);
        test.children().iter().any(|child| self.pass(child, &path))
    }

    /// Number of leaves below `root` that pass
    pub fn count_test_cases(&self, root: &Test) -> usize {
        self.count_below(root, &[])
    }

    fn count_below(&self, test: &Test, ancestors: &[&Test]) -> usize {
        if !self.pass(test, ancestors) {
            return 0;
        }
        if !test.is_suite() {
            return 1;
        }

        let mut path = ancestors.to_vec();
        path.push(test);
        test.children()
            .iter()
            .map(|child| self.count_below(child, &path))
            .sum()
    }
}

impl fmt::Debug for TestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestFilter::Empty => write!(f, "Empty"),
            TestFilter::FullName(name) => write!(f, "FullName({name})"),
            TestFilter::Categories(c) => write!(f, "Categories({})", c.join(",")),
            TestFilter::Ids(ids) => write!(f, "Ids({})", ids.len()),
            TestFilter::Predicate(_) => write!(f, "Predicate"),
            TestFilter::And(fs) => f.debug_tuple("And").field(fs).finish(),
            TestFilter::Or(fs) => f.debug_tuple("Or").field(fs).finish(),
            TestFilter::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
        }
    }
}
