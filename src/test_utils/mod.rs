//! Shared test utilities for skillweave.

use std::fmt::Debug;
use std::panic::{self, RefUnwindSafe};
use std::time::Instant;

use tracing::debug;

pub mod fixtures;
pub mod logging;

/// One row of a table-driven test.
#[derive(Debug, Clone)]
pub struct TestCase<I, E> {
    pub name: &'static str,
    pub input: I,
    pub expected: E,
    pub should_panic: bool,
}

impl<I, E> TestCase<I, E> {
    pub const fn new(name: &'static str, input: I, expected: E) -> Self {
        Self {
            name,
            input,
            expected,
            should_panic: false,
        }
    }

    /// The case passes only if `test_fn` panics; `expected` is ignored.
    #[must_use]
    pub const fn expect_panic(mut self) -> Self {
        self.should_panic = true;
        self
    }
}

/// Run every row through `test_fn`.
///
/// All rows run even after a failure; the error lists each failing row by
/// name so one run shows the whole table's state.
pub fn run_table_tests<I, E, F>(cases: Vec<TestCase<I, E>>, test_fn: F) -> Result<(), String>
where
    I: Debug + Clone + RefUnwindSafe,
    E: Debug + PartialEq,
    F: Fn(I) -> E + RefUnwindSafe,
{
    let total = cases.len();
    let mut failures = Vec::new();

    for case in cases {
        let started = Instant::now();
        let outcome = panic::catch_unwind(|| test_fn(case.input.clone()));
        let elapsed_us = started.elapsed().as_micros();

        let failure = match (outcome, case.should_panic) {
            (Err(_), true) => None,
            (Ok(actual), true) => Some(format!("returned {actual:?}, wanted a panic")),
            (Err(_), false) => Some("panicked".to_string()),
            (Ok(actual), false) if actual == case.expected => None,
            (Ok(actual), false) => Some(format!("wanted {:?}, got {actual:?}", case.expected)),
        };

        debug!(
            case = case.name,
            input = ?case.input,
            elapsed_us,
            passed = failure.is_none(),
            "table case"
        );
        if let Some(reason) = failure {
            failures.push(format!("{}: {reason}", case.name));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} of {total} cases failed:\n  {}",
            failures.len(),
            failures.join("\n  ")
        ))
    }
}
