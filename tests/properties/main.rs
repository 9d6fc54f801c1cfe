//! Property test suite entry point.

mod determinism_tests;
mod safety_tests;
mod strategies;
