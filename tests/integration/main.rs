//! Integration test suite entry point.

mod backup_tests;
mod diagnostics_tests;
mod disk_tests;
mod reconcile_tests;
mod tombstone_tests;
mod writer_tests;
