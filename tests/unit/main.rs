//! Unit test suite entry point.

mod cli_parse_tests;
mod config_tests;
mod key_tests;
mod logs_tests;
mod schema_tests;
