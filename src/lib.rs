pub mod app;
pub mod backend;
pub mod backup;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod facade;
pub mod key;
pub mod loader;
pub mod logs;
pub mod migrate;
pub mod probe;
pub mod reconcile;
pub mod schema;
pub mod test_utils;
pub mod tombstone;
pub mod writer;

pub use engine::{EngineBuilder, StorageEngine};
pub use error::{Result, StoreError};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
