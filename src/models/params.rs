//! Parameter combining strategies
//!
//! Turn per-argument value sources into the argument lists of the generated
//! cases of a parameterized method.

use serde_json::Value;

/// How argument sources are combined into cases
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CombiningStrategy {
    /// Every combination of values (cartesian product)
    #[default]
    Combinatorial,
    /// Sources consumed side by side; exhausted sources yield null
    Sequential,
}

impl CombiningStrategy {
    pub fn combine(&self, sources: &[Vec<Value>]) -> Vec<Vec<Value>> {
        match self {
            CombiningStrategy::Combinatorial => combinatorial(sources),
            CombiningStrategy::Sequential => sequential(sources),
        }
    }
}

fn combinatorial(sources: &[Vec<Value>]) -> Vec<Vec<Value>> {
    if sources.iter().any(Vec::is_empty) {
        return Vec::new();
    }

    let mut cases = Vec::new();
    let mut indices = vec![0usize; sources.len()];

    loop {
        cases.push(
            indices
                .iter()
                .zip(sources)
                .map(|(&i, source)| source[i].clone())
                .collect(),
        );

        // Advance the rightmost position that still has values left
        let mut position = sources.len();
        loop {
            if position == 0 {
                return cases;
            }
            position -= 1;
            indices[position] += 1;
            if indices[position] < sources[position].len() {
                break;
            }
            indices[position] = 0;
        }
    }
}

fn sequential(sources: &[Vec<Value>]) -> Vec<Vec<Value>> {
    let longest = sources.iter().map(Vec::len).max().unwrap_or(0);

    (0..longest)
        .map(|i| {
            sources
                .iter()
                .map(|source| source.get(i).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect()
}

/// Display name of a generated case, e.g. `Add(1,"two")`
pub fn case_name(method: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("{}({})", method, args.join(","))
}
