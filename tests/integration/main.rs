//! Integration test suite entry point.

mod composition_tests;
mod override_tests;
mod retrieval_tests;
mod support;
