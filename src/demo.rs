//! Built-in demo tree
//!
//! A small tree exercising fixtures, per-test and one-time hooks,
//! parameterized cases, benchmarks, decorators, timeouts and parallel
//! fixtures. The CLI runs it in place of discovered tests.

use rand::Rng;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::TestFailure;
use crate::models::{
    Attribute, CombiningStrategy, MethodBuilder, ParallelScope, SetUpTearDownLevel, SuiteBuilder, Test,
};

/// Build the demo tree
pub fn demo_tree() -> Arc<Test> {
    SuiteBuilder::new("Demo")
        .attribute(Attribute::LevelOfParallelism(4))
        .suite(arithmetic())
        .suite(strings())
        .suite(timing())
        .suite(parallel())
        .suite(misc())
        .build()
}

fn arithmetic() -> SuiteBuilder {
    let setups = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&setups);

    SuiteBuilder::fixture("Arithmetic")
        .attribute(Attribute::Category("fast".into()))
        .level(SetUpTearDownLevel::new("Arithmetic").setup("CountSetUp", move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }))
        .test(MethodBuilder::new("Adds", |ctx| ctx.assert_eq(4, 2 + 2)))
        .test(MethodBuilder::new("Multiplies", |ctx| ctx.assert_eq(12, 3 * 4)))
        .test(MethodBuilder::new("RanSetUp", move |ctx| {
            ctx.assert_that(setups.load(Ordering::Relaxed) > 0, "per-test setup did not run")
        }))
        .suite(SuiteBuilder::parameterized(
            "Divide",
            CombiningStrategy::Combinatorial,
            vec![vec![json!(10), json!(20)], vec![json!(2), json!(5)]],
            |ctx, args| {
                let dividend = int_arg(args, 0)?;
                let divisor = int_arg(args, 1)?;
                ctx.assert_eq(dividend, (dividend / divisor) * divisor)
            },
        ))
}

fn int_arg(args: &[Value], index: usize) -> Result<i64, TestFailure> {
    args.get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| TestFailure::error(format!("argument {index} is not an integer")))
}

fn strings() -> SuiteBuilder {
    SuiteBuilder::fixture("Strings")
        .attribute(Attribute::Category("bench".into()))
        .attribute(Attribute::BenchCount(3))
        .test(
            MethodBuilder::bench("Concat", |ctx| {
                let n = ctx.iterations().unwrap_or(1);
                let joined = ctx.measure("concat", || {
                    (0..n).fold(String::new(), |mut acc, i| {
                        acc.push(char::from(b'a' + (i % 26) as u8));
                        acc
                    })
                });
                ctx.assert_eq(n as usize, joined.len())
            })
            .attribute(Attribute::Iterations(1000)),
        )
        .test(MethodBuilder::bench("Format", |ctx| {
            let text = ctx.measure("format", || format!("{:>8.3}|{:<6}", 1.2345, "ratio"));
            ctx.measure("parse", || text.trim().len());
            Ok(())
        }))
}

fn timing() -> SuiteBuilder {
    let repeats = Arc::new(AtomicU32::new(0));

    SuiteBuilder::fixture("Timing")
        .one_time_level(
            SetUpTearDownLevel::new("Timing")
                .setup("Prepare", |_| Ok(()))
                .teardown("Release", |_| Ok(())),
        )
        .test(
            MethodBuilder::new("WithinTimeout", |ctx| {
                for _ in 0..4 {
                    ctx.checkpoint()?;
                    thread::sleep(Duration::from_millis(5));
                }
                Ok(())
            })
            .attribute(Attribute::Timeout(1_000)),
        )
        .test(
            MethodBuilder::new("WithinMaxTime", |_| {
                thread::sleep(Duration::from_millis(2));
                Ok(())
            })
            .attribute(Attribute::MaxTime(1_000)),
        )
        .test(
            MethodBuilder::new("Repeated", move |ctx| {
                let run = repeats.fetch_add(1, Ordering::Relaxed);
                ctx.assert_that(run < 3, "ran more often than requested")
            })
            .attribute(Attribute::Repeat(3)),
        )
}

fn parallel() -> SuiteBuilder {
    let mut fixture = SuiteBuilder::fixture("Parallel")
        .attribute(Attribute::Parallelizable(ParallelScope::CHILDREN));
    for i in 1..=4 {
        fixture = fixture.test(MethodBuilder::new(format!("Sleep{i}"), |_| {
            thread::sleep(Duration::from_millis(20));
            Ok(())
        }));
    }
    fixture
}

fn misc() -> SuiteBuilder {
    SuiteBuilder::fixture("Misc")
        .test(
            MethodBuilder::new("Seeded", |ctx| {
                let first: u32 = ctx.random().random_range(0..1_000);
                let second: u32 = ctx.random().random_range(0..1_000);
                ctx.assert_eq(first, second)
            })
            .attribute(Attribute::RequiresThread),
        )
        .test(
            MethodBuilder::new("Unfinished", |_| Err(TestFailure::error("not implemented")))
                .attribute(Attribute::Ignore("Waiting on a fix".into())),
        )
        .test(
            MethodBuilder::new("Manual", |_| Ok(()))
                .attribute(Attribute::Explicit(Some("Run on request".into()))),
        )
}
