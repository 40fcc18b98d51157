//! Process-level context: resolved paths, config and the storage engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{Backend, JsonFileBackend, SqliteBackend, TierId};
use crate::cli::Cli;
use crate::config::Config;
use crate::engine::StorageEngine;
use crate::error::Result;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TIERKV_DATA_DIR";

pub struct AppContext {
    pub data_dir: PathBuf,
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub robot_mode: bool,
    pub engine: StorageEngine,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let data_dir = resolve_data_dir(cli.data_dir.as_deref());
        let config = Config::load(cli.config.as_deref(), &data_dir)?;
        let engine = build_engine(&config, &data_dir);
        Ok(Self {
            data_dir,
            config,
            config_path: cli.config.clone(),
            robot_mode: cli.robot,
            engine,
        })
    }
}

/// `--data-dir`, then `TIERKV_DATA_DIR`, then the platform data dir.
#[must_use]
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::data_dir().map_or_else(|| PathBuf::from(".tierkv"), |dir| dir.join("tierkv"))
}

/// Map the configured tiers onto files under `data_dir`.
///
/// The extension tier is a SQLite database, the two page tiers are
/// quota-capped JSON documents and the session tier lives under the system
/// temp dir. A tier that cannot even be opened is left out; the probe then
/// works with what remains.
#[must_use]
pub fn build_engine(config: &Config, data_dir: &Path) -> StorageEngine {
    let mut builder = StorageEngine::builder(config.clone());
    let tiers = &config.tiers;

    if tiers.extension {
        match SqliteBackend::open(&data_dir.join("extension.db")) {
            Ok(db) => builder = builder.backend(Arc::new(db)),
            Err(e) => warn!(error = %e, "extension database could not be opened"),
        }
    }
    if tiers.page_primary {
        builder = builder.backend(page_tier(
            TierId::PagePrimary,
            data_dir.join("page.json"),
            tiers.page_quota_bytes,
        ));
    }
    if tiers.page_secondary {
        builder = builder.backend(page_tier(
            TierId::PageSecondary,
            data_dir.join("page-secondary.json"),
            tiers.page_quota_bytes,
        ));
    }
    if tiers.session {
        let path = std::env::temp_dir()
            .join("tierkv-session")
            .join(format!("{}.json", tiers.session_id));
        debug!(path = %path.display(), "session tier");
        builder = builder.backend(Arc::new(JsonFileBackend::new(TierId::Session, path)));
    }

    builder.build()
}

fn page_tier(tier: TierId, path: PathBuf, quota: u64) -> Arc<dyn Backend> {
    Arc::new(JsonFileBackend::new(tier, path).with_quota(quota))
}
