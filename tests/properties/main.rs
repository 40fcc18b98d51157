//! Property test suite entry point.

mod merge_tests;
mod replica_tests;
