use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::app::build_engine;
use crate::backend::{MockBackend, TierId};
use crate::config::Config;
use crate::engine::StorageEngine;
use crate::writer::{AlertSink, CriticalAlert};

/// Config with a 1 ms retry delay so failing writes finish quickly.
#[must_use]
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.write.retry_delay_ms = 1;
    config
}

/// Alert sink that keeps every alert for inspection.
#[derive(Default)]
pub struct RecordingAlerts {
    alerts: Mutex<Vec<CriticalAlert>>,
}

impl RecordingAlerts {
    pub fn alerts(&self) -> Vec<CriticalAlert> {
        self.alerts.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().len()
    }
}

impl AlertSink for RecordingAlerts {
    fn alert(&self, alert: &CriticalAlert) {
        self.alerts.lock().push(alert.clone());
    }
}

/// Engine over the three replica tiers, each a [`MockBackend`].
pub struct EngineFixture {
    pub ext: Arc<MockBackend>,
    pub page: Arc<MockBackend>,
    pub alt: Arc<MockBackend>,
    pub alerts: Arc<RecordingAlerts>,
    pub engine: StorageEngine,
}

impl EngineFixture {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: Config) -> Self {
        let ext = Arc::new(MockBackend::new(TierId::ExtensionPersistent));
        let page = Arc::new(MockBackend::new(TierId::PagePrimary));
        let alt = Arc::new(MockBackend::new(TierId::PageSecondary));
        Self::from_parts(config, ext, page, alt)
    }

    /// Build over pre-seeded or faulty mocks.
    pub fn from_parts(
        config: Config,
        ext: Arc<MockBackend>,
        page: Arc<MockBackend>,
        alt: Arc<MockBackend>,
    ) -> Self {
        let alerts = Arc::new(RecordingAlerts::default());
        let engine = StorageEngine::builder(config)
            .backend(ext.clone())
            .backend(page.clone())
            .backend(alt.clone())
            .alert_sink(alerts.clone())
            .build();
        Self {
            ext,
            page,
            alt,
            alerts,
            engine,
        }
    }

    /// Rebuild the engine over the same mocks, as a restart would.
    pub fn restart(self) -> Self {
        let config = self.engine.config().clone();
        Self::from_parts(config, self.ext, self.page, self.alt)
    }
}

impl Default for EngineFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Isolated data directory with the real on-disk tiers.
pub struct DiskFixture {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
    pub config: Config,
}

impl DiskFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().to_path_buf();
        let mut config = fast_config();
        // The session tier lives under the system temp dir; keep runs apart.
        config.tiers.session_id = uuid::Uuid::new_v4().simple().to_string();

        println!("[FIXTURE] Created data directory: {}", data_dir.display());

        Self {
            temp_dir,
            data_dir,
            config,
        }
    }

    /// A fresh engine over the fixture's files.
    pub fn engine(&self) -> StorageEngine {
        build_engine(&self.config, &self.data_dir)
    }

    /// Write a file relative to the data directory.
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_dir.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }
}

impl Default for DiskFixture {
    fn default() -> Self {
        Self::new()
    }
}
