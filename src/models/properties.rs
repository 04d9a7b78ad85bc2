//! Property bag attached to every test node
//!
//! An insertion-ordered multi-map from case-sensitive string keys to string
//! values. Typed values are stored in their string form and parsed on read.

use indexmap::IndexMap;
use serde::Serialize;
use std::str::FromStr;

/// Well-known property keys
pub mod names {
    pub const CATEGORY: &str = "Category";
    pub const DESCRIPTION: &str = "Description";
    pub const TIMEOUT: &str = "Timeout";
    pub const MAX_TIME: &str = "MaxTime";
    pub const REPEAT: &str = "Repeat";
    pub const ITERATIONS: &str = "Iterations";
    pub const BENCH_COUNT: &str = "BenchCount";
    pub const REQUIRES_THREAD: &str = "RequiresThread";
    pub const PARALLEL_SCOPE: &str = "ParallelScope";
    pub const LEVEL_OF_PARALLELISM: &str = "LevelOfParallelism";
    pub const SKIP_REASON: &str = "_SKIPREASON";
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PropertyBag {
    entries: IndexMap<String, Vec<String>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`, keeping any existing values
    pub fn add(&mut self, key: impl Into<String>, value: impl ToString) {
        self.entries
            .entry(key.into())
            .or_default()
            .push(value.to_string());
    }

    /// Replace all values under `key` with a single value
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.entries.insert(key.into(), vec![value.to_string()]);
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values stored under `key`, in insertion order
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value under `key` parsed as `T`; unparseable values read as absent
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_valued_keys() {
        let mut props = PropertyBag::new();
        props.add(names::CATEGORY, "fast");
        props.add(names::CATEGORY, "cpu");

        assert_eq!(props.get(names::CATEGORY), Some("fast"));
        assert_eq!(props.get_all(names::CATEGORY), ["fast", "cpu"]);
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let mut props = PropertyBag::new();
        props.set("Timeout", 50);

        assert!(props.contains_key("Timeout"));
        assert!(!props.contains_key("timeout"));
        assert_eq!(props.get("timeout"), None);
    }

    #[test]
    fn test_set_replaces_and_parses() {
        let mut props = PropertyBag::new();
        props.add(names::ITERATIONS, 10);
        props.set(names::ITERATIONS, 20);

        assert_eq!(props.get_parsed::<u32>(names::ITERATIONS), Some(20));
        assert_eq!(props.get_all(names::ITERATIONS).len(), 1);
    }

    #[test]
    fn test_missing_and_malformed_values() {
        let mut props = PropertyBag::new();
        props.set(names::TIMEOUT, "soon");

        assert_eq!(props.get_parsed::<u64>(names::TIMEOUT), None);
        assert!(props.get_all(names::BENCH_COUNT).is_empty());
        assert_eq!(props.keys().collect::<Vec<_>>(), ["Timeout"]);
    }
}
