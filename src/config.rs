use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::schema::Shape;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TIERKV_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tiers: TiersConfig,
    #[serde(default)]
    pub write: WriteConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default = "default_shapes")]
    pub shapes: BTreeMap<String, Shape>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            tiers: TiersConfig::default(),
            write: WriteConfig::default(),
            logs: LogsConfig::default(),
            reconcile: ReconcileConfig::default(),
            shapes: default_shapes(),
        }
    }
}

impl Config {
    /// Defaults, then the global and data-dir config files (or only the
    /// explicit file when one is given), then `TIERKV_*` overrides.
    pub fn load(explicit_path: Option<&Path>, data_dir: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => return Err(StoreError::ConfigNotFound(path.display().to_string())),
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(local) = Self::load_patch(&data_dir.join("config.toml"))? {
                config.merge_patch(local);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        match dirs::config_dir() {
            Some(dir) => Self::load_patch(&dir.join("tierkv/config.toml")),
            None => Ok(None),
        }
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| StoreError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| StoreError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.storage {
            self.storage.merge(patch);
        }
        if let Some(patch) = patch.tiers {
            self.tiers.merge(patch);
        }
        if let Some(patch) = patch.write {
            self.write.merge(patch);
        }
        if let Some(patch) = patch.logs {
            self.logs.merge(patch);
        }
        if let Some(patch) = patch.reconcile {
            self.reconcile.merge(patch);
        }
        if let Some(shapes) = patch.shapes {
            self.shapes.extend(shapes);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("TIERKV_NAMESPACE_PREFIX") {
            self.storage.namespace_prefix = value;
        }

        if let Some(value) = env_bool("TIERKV_TIERS_EXTENSION") {
            self.tiers.extension = value;
        }
        if let Some(value) = env_bool("TIERKV_TIERS_PAGE_PRIMARY") {
            self.tiers.page_primary = value;
        }
        if let Some(value) = env_bool("TIERKV_TIERS_PAGE_SECONDARY") {
            self.tiers.page_secondary = value;
        }
        if let Some(value) = env_bool("TIERKV_TIERS_SESSION") {
            self.tiers.session = value;
        }
        if let Some(value) = env_u64("TIERKV_TIERS_PAGE_QUOTA_BYTES")? {
            self.tiers.page_quota_bytes = value;
        }
        if let Some(value) = env_string("TIERKV_SESSION_ID") {
            self.tiers.session_id = value;
        }

        if let Some(value) = env_u32("TIERKV_WRITE_MAX_ATTEMPTS")? {
            self.write.max_attempts = value;
        }
        if let Some(value) = env_u64("TIERKV_WRITE_RETRY_DELAY_MS")? {
            self.write.retry_delay_ms = value;
        }
        if let Some(values) = env_list("TIERKV_WRITE_CRITICAL_KEYS") {
            self.write.critical_keys = values;
        }
        if let Some(values) = env_list("TIERKV_WRITE_DISPOSABLE_KEYS") {
            self.write.disposable_keys = values;
        }

        if let Some(values) = env_list("TIERKV_LOGS_KEYS") {
            self.logs.keys = values;
        }
        if let Some(value) = env_u32("TIERKV_LOGS_MAX_IN_MAIN")? {
            self.logs.max_in_main = value as usize;
        }
        if let Some(value) = env_u32("TIERKV_LOGS_MAX_IN_STORAGE")? {
            self.logs.max_in_storage = value as usize;
        }

        if let Some(values) = env_list("TIERKV_RECONCILE_KEYS") {
            self.reconcile.keys = values;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.storage.namespace_prefix.is_empty() {
            return Err(StoreError::Config(
                "storage.namespace_prefix must not be empty".to_string(),
            ));
        }
        if self.write.max_attempts == 0 {
            return Err(StoreError::Config(
                "write.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.logs.archive_suffix.is_empty() {
            return Err(StoreError::Config(
                "logs.archive_suffix must not be empty".to_string(),
            ));
        }
        if self.logs.max_in_main == 0 || self.logs.max_in_storage == 0 {
            return Err(StoreError::Config(
                "logs.max_in_main and logs.max_in_storage must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Prefix every logical key must carry.
    pub namespace_prefix: String,
    /// Unprefixed key under which tombstones are persisted.
    pub tombstone_key: String,
    /// Unprefixed key of the one-shot migration flag.
    pub migration_flag_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: "NS_".to_string(),
            tombstone_key: "tombstones".to_string(),
            migration_flag_key: "migration_completed".to_string(),
        }
    }
}

impl StorageConfig {
    fn merge(&mut self, patch: StoragePatch) {
        if let Some(value) = patch.namespace_prefix {
            self.namespace_prefix = value;
        }
        if let Some(value) = patch.tombstone_key {
            self.tombstone_key = value;
        }
        if let Some(value) = patch.migration_flag_key {
            self.migration_flag_key = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiersConfig {
    pub extension: bool,
    pub page_primary: bool,
    pub page_secondary: bool,
    pub session: bool,
    /// Size cap for each page-scoped document.
    pub page_quota_bytes: u64,
    /// Names the session-scoped document; a new id starts an empty session.
    pub session_id: String,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            extension: true,
            page_primary: true,
            page_secondary: true,
            session: true,
            page_quota_bytes: 5 * 1024 * 1024,
            session_id: "default".to_string(),
        }
    }
}

impl TiersConfig {
    fn merge(&mut self, patch: TiersPatch) {
        if let Some(value) = patch.extension {
            self.extension = value;
        }
        if let Some(value) = patch.page_primary {
            self.page_primary = value;
        }
        if let Some(value) = patch.page_secondary {
            self.page_secondary = value;
        }
        if let Some(value) = patch.session {
            self.session = value;
        }
        if let Some(value) = patch.page_quota_bytes {
            self.page_quota_bytes = value;
        }
        if let Some(value) = patch.session_id {
            self.session_id = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Total attempts per save, first try included.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_delay_ms: u64,
    /// Unprefixed keys whose final save failure is surfaced to the user.
    pub critical_keys: Vec<String>,
    /// Unprefixed cache keys purged when a tier runs out of quota.
    pub disposable_keys: Vec<String>,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 100,
            critical_keys: vec!["petPresets".to_string(), "seedsToDelete".to_string()],
            disposable_keys: vec![
                "console-history".to_string(),
                "debug-cache".to_string(),
                "temp-cache".to_string(),
            ],
        }
    }
}

impl WriteConfig {
    fn merge(&mut self, patch: WritePatch) {
        if let Some(value) = patch.max_attempts {
            self.max_attempts = value;
        }
        if let Some(value) = patch.retry_delay_ms {
            self.retry_delay_ms = value;
        }
        if let Some(value) = patch.critical_keys {
            self.critical_keys = value;
        }
        if let Some(value) = patch.disposable_keys {
            self.disposable_keys = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Unprefixed keys holding append-only log collections.
    pub keys: Vec<String>,
    pub archive_suffix: String,
    /// Records kept under the main key; older ones move to the archive.
    pub max_in_main: usize,
    /// Cap on the archive companion.
    pub max_in_storage: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            keys: vec!["petAbilityLogs".to_string()],
            archive_suffix: "_archive".to_string(),
            max_in_main: 1000,
            max_in_storage: 10_000,
        }
    }
}

impl LogsConfig {
    fn merge(&mut self, patch: LogsPatch) {
        if let Some(value) = patch.keys {
            self.keys = value;
        }
        if let Some(value) = patch.archive_suffix {
            self.archive_suffix = value;
        }
        if let Some(value) = patch.max_in_main {
            self.max_in_main = value;
        }
        if let Some(value) = patch.max_in_storage {
            self.max_in_storage = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Unprefixed keys visited by a reconcile pass, export and migration.
    pub keys: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            keys: [
                "data",
                "settings",
                "petPresets",
                "petPresetsOrder",
                "petAbilityLogs",
                "petAbilityLogs_archive",
                "seedsToDelete",
                "autoDeleteEnabled",
                "filterMode",
                "abilityFilters",
                "customMode",
                "petFilters",
                "petPresetHotkeys",
                "hotkeys",
                "overlayPositions",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ReconcileConfig {
    fn merge(&mut self, patch: ReconcilePatch) {
        if let Some(value) = patch.keys {
            self.keys = value;
        }
    }
}

/// Declared value shapes of the well-known keys. Unlisted keys accept any
/// shape.
fn default_shapes() -> BTreeMap<String, Shape> {
    [
        ("data", Shape::Map),
        ("settings", Shape::Map),
        ("petPresets", Shape::Map),
        ("petPresetsOrder", Shape::List),
        ("petAbilityLogs", Shape::List),
        ("petAbilityLogs_archive", Shape::List),
        ("seedsToDelete", Shape::List),
        ("autoDeleteEnabled", Shape::Scalar),
        ("filterMode", Shape::Scalar),
        ("abilityFilters", Shape::Map),
        ("petFilters", Shape::Map),
        ("petPresetHotkeys", Shape::Map),
        ("hotkeys", Shape::Map),
        ("overlayPositions", Shape::Map),
    ]
    .into_iter()
    .map(|(key, shape)| (key.to_string(), shape))
    .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub storage: Option<StoragePatch>,
    pub tiers: Option<TiersPatch>,
    pub write: Option<WritePatch>,
    pub logs: Option<LogsPatch>,
    pub reconcile: Option<ReconcilePatch>,
    pub shapes: Option<BTreeMap<String, Shape>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StoragePatch {
    pub namespace_prefix: Option<String>,
    pub tombstone_key: Option<String>,
    pub migration_flag_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TiersPatch {
    pub extension: Option<bool>,
    pub page_primary: Option<bool>,
    pub page_secondary: Option<bool>,
    pub session: Option<bool>,
    pub page_quota_bytes: Option<u64>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WritePatch {
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub critical_keys: Option<Vec<String>>,
    pub disposable_keys: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LogsPatch {
    pub keys: Option<Vec<String>>,
    pub archive_suffix: Option<String>,
    pub max_in_main: Option<usize>,
    pub max_in_storage: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ReconcilePatch {
    pub keys: Option<Vec<String>>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u32>().map(Some).map_err(|err| {
            StoreError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|err| {
            StoreError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}
