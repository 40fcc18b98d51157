//! The storage engine: probe, facade, replica loader, verified writer and
//! reconciler wired over one set of injected tiers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{
    Backend, MemoryBackend, TierId, TierSet, TombstoneAwareBackend,
};
use crate::backup::{ImportReport, Snapshot};
use crate::config::Config;
use crate::diagnostics::{Diagnostics, HealthReport, ScanReport};
use crate::error::{Result, StoreError};
use crate::facade::KvFacade;
use crate::key::LogicalKey;
use crate::loader::{ReconciledValue, ReplicaLoader};
use crate::logs::{
    archive_overflow, entries_from_json, entries_to_json, merge, LogCollection, LogEntry,
};
use crate::migrate::{MigrationReport, MigrationStats, Migrator};
use crate::probe::{BackendProbe, ProbeReport};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::schema::{decode, SchemaRegistry, StoredValue};
use crate::tombstone::TombstoneRegistry;
use crate::writer::{AlertSink, LogAlertSink, PreparedWrite, VerifiedWriter, WritePolicy, WriteReceipt};

/// Assembles a [`StorageEngine`] from injected backends.
pub struct EngineBuilder {
    config: Config,
    tiers: TierSet,
    alerts: Arc<dyn AlertSink>,
}

impl EngineBuilder {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tiers: TierSet::new(),
            alerts: Arc::new(LogAlertSink),
        }
    }

    /// Add a tier. A second backend for the same tier replaces the first.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.tiers.insert(backend);
        self
    }

    #[must_use]
    pub fn alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Probe the tiers and wire the engine. Never fails: with no working
    /// tier the engine runs on the in-process memory tier.
    #[must_use]
    pub fn build(self) -> StorageEngine {
        let Self {
            config,
            mut tiers,
            alerts,
        } = self;
        let prefix = config.storage.namespace_prefix.clone();

        if !tiers.contains(TierId::Memory) {
            tiers.insert(Arc::new(MemoryBackend::new()));
        }
        let raw = tiers;

        let probe = BackendProbe::new(&prefix);
        let report = probe.select_tier(&raw).clone();
        let selected = report.selected;
        let selected_raw: Arc<dyn Backend> = raw
            .get(selected)
            .cloned()
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));

        let tombstones = TombstoneRegistry::persistent(
            selected_raw,
            LogicalKey::prefixed(&config.storage.tombstone_key, &prefix).as_str(),
            &config.logs.archive_suffix,
        );
        let guarded = raw.map(|backend| TombstoneAwareBackend::wrap(backend, &tombstones));
        let selected_guarded: Arc<dyn Backend> = guarded
            .get(selected)
            .cloned()
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));

        let schemas = Arc::new(SchemaRegistry::from_config(&config));
        let facade = Arc::new(KvFacade::new(selected_guarded));
        let loader = Arc::new(ReplicaLoader::new(
            guarded.clone(),
            selected,
            facade.clone(),
            schemas.clone(),
            tombstones.clone(),
        ));
        let writer = VerifiedWriter::new(
            guarded.clone(),
            selected,
            facade.clone(),
            schemas.clone(),
            WritePolicy::from_config(&config),
            alerts,
        );

        let registry: Vec<LogicalKey> = config
            .reconcile
            .keys
            .iter()
            .map(|short| LogicalKey::prefixed(short, &prefix))
            .collect();
        let reachable: Vec<TierId> = report
            .available()
            .into_iter()
            .filter(|tier| raw.contains(*tier))
            .collect();
        let reconciler = Reconciler::new(guarded.clone(), reachable, loader.clone(), registry.clone());
        let diagnostics = Diagnostics::new(raw.clone(), tombstones.clone(), selected, &prefix);

        info!(%selected, tiers = ?raw, "storage engine ready");
        StorageEngine {
            config,
            prefix,
            raw,
            guarded,
            report,
            tombstones,
            schemas,
            facade,
            loader,
            writer,
            reconciler,
            diagnostics,
            registry,
        }
    }
}

/// Outcome of [`StorageEngine::append_logs`].
#[derive(Debug, Clone, Serialize)]
pub struct AppendOutcome {
    pub key: String,
    pub added: usize,
    pub total: usize,
    pub tombstone_lifted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<WriteReceipt>,
}

/// Outcome of [`StorageEngine::hard_clear`].
#[derive(Debug, Clone, Serialize)]
pub struct HardClearReport {
    pub key: String,
    pub archive: String,
    pub cleared: Vec<TierId>,
    pub errors: Vec<String>,
}

pub struct StorageEngine {
    config: Config,
    prefix: String,
    raw: TierSet,
    guarded: TierSet,
    report: ProbeReport,
    tombstones: TombstoneRegistry,
    schemas: Arc<SchemaRegistry>,
    facade: Arc<KvFacade>,
    loader: Arc<ReplicaLoader>,
    writer: VerifiedWriter,
    reconciler: Reconciler,
    diagnostics: Diagnostics,
    registry: Vec<LogicalKey>,
}

impl StorageEngine {
    #[must_use]
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn probe_report(&self) -> &ProbeReport {
        &self.report
    }

    #[must_use]
    pub fn selected_tier(&self) -> TierId {
        self.report.selected
    }

    /// Keys visited by reconcile, export and migration.
    #[must_use]
    pub fn registry(&self) -> &[LogicalKey] {
        &self.registry
    }

    #[must_use]
    pub fn tombstones(&self) -> Vec<String> {
        self.tombstones.keys()
    }

    /// Namespace-enforced key. A missing prefix is corrected and traced.
    #[must_use]
    pub fn key(&self, raw: &str) -> LogicalKey {
        LogicalKey::enforce(raw, &self.prefix)
    }

    // Single-tier access, no reconciliation.

    #[must_use]
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.facade.get(key, default)
    }

    pub fn set(&self, key: &str, value: &Value) -> bool {
        self.facade.set(key, value)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.facade.remove(key)
    }

    pub fn clear(&self) -> bool {
        self.facade.clear()
    }

    // Reconciliation-aware access.

    #[must_use]
    pub fn load_namespaced(&self, key: &str, fallback: Value) -> Value {
        self.loader.load(&self.key(key), fallback)
    }

    #[must_use]
    pub fn load_detailed(&self, key: &str) -> Option<ReconciledValue> {
        self.loader.load_detailed(&self.key(key))
    }

    /// Verified save. `false` means every attempt failed; critical keys have
    /// already raised an alert by then.
    pub async fn save_namespaced(&self, key: &str, value: &Value) -> bool {
        self.save(key, value).await.is_ok()
    }

    /// Verified save with the full receipt.
    pub async fn save(&self, key: &str, value: &Value) -> Result<WriteReceipt> {
        let key = self.key(key);
        let prepared = self.writer.prepare(&key, value)?;
        let lift = self.should_lift(&key, &prepared);
        self.commit(&key, prepared, lift).await
    }

    // Log collections.

    /// Merge `entries` into the log key. Writes only when something new was
    /// added.
    pub async fn append_logs(&self, key: &str, entries: Vec<LogEntry>) -> Result<AppendOutcome> {
        let mut collection = self.log_collection(key);
        collection.extend(entries);
        if collection.added() == 0 {
            debug!(key = %collection.key(), "append added nothing");
            return Ok(AppendOutcome {
                key: collection.key().to_string(),
                added: 0,
                total: collection.len(),
                tombstone_lifted: false,
                receipt: None,
            });
        }
        let key = collection.key().to_string();
        let added = collection.added();
        let total = collection.len();
        let lifted = collection.lifts_tombstone();
        let receipt = self.commit_logs(collection).await?;
        Ok(AppendOutcome {
            key,
            added,
            total,
            tombstone_lifted: lifted,
            receipt: Some(receipt),
        })
    }

    /// Open the current contents of a log key for in-place editing.
    #[must_use]
    pub fn log_collection(&self, key: &str) -> LogCollection {
        let key = self.key(key);
        let current = entries_from_json(&self.loader.load(&key, Value::Array(Vec::new())));
        LogCollection::new(key, &current, self.tombstones.clone())
    }

    /// Persist an edited collection.
    pub async fn commit_logs(&self, collection: LogCollection) -> Result<WriteReceipt> {
        let lift = collection.lifts_tombstone();
        let key = collection.key().clone();
        let value = entries_to_json(&collection.into_entries());
        let prepared = self.writer.prepare(&key, &value)?;
        self.commit(&key, prepared, lift).await
    }

    /// Main and archive records of a log key, newest first.
    #[must_use]
    pub fn load_all_logs(&self, key: &str) -> Vec<LogEntry> {
        let key = self.key(key);
        let empty = || Value::Array(Vec::new());
        let main = entries_from_json(&self.loader.load(&key, empty()));
        let archive_key = key.archive(self.schemas.archive_suffix());
        let archive = entries_from_json(&self.loader.load(&archive_key, empty()));
        merge(&main, &archive).entries
    }

    // Maintenance.

    pub fn reconcile_all(&self) -> ReconcileReport {
        self.reconciler.reconcile_all()
    }

    #[must_use]
    pub fn scan_all_locations(&self, key: &str) -> ScanReport {
        self.diagnostics.scan_all_locations(&self.key(key))
    }

    /// Tombstone `key`, then wipe it and its archive companion from every
    /// tier.
    pub fn hard_clear(&self, key: &str) -> HardClearReport {
        let key = self.key(key);
        let archive = key.archive(self.schemas.archive_suffix());
        self.tombstones.set(key.as_str());

        let mut cleared = Vec::new();
        let mut errors = Vec::new();
        for backend in self.raw.iter() {
            let outcome = backend
                .remove(key.as_str())
                .and_then(|()| backend.remove(archive.as_str()));
            match outcome {
                Ok(()) => cleared.push(backend.tier()),
                Err(e) => {
                    warn!(tier = %backend.tier(), key = %key, error = %e, "hard clear incomplete");
                    errors.push(format!("{}: {e}", backend.tier()));
                }
            }
        }
        self.facade.forget_shadow(key.as_str());
        self.facade.forget_shadow(archive.as_str());
        info!(key = %key, tiers = cleared.len(), "hard cleared");

        HardClearReport {
            key: key.to_string(),
            archive: archive.to_string(),
            cleared,
            errors,
        }
    }

    #[must_use]
    pub fn health_check(&self) -> HealthReport {
        self.diagnostics.health_check()
    }

    /// Copy registry keys from the primary page tier into the extension
    /// tier once.
    pub fn migrate_to_persistent(&self) -> Result<MigrationReport> {
        self.migrator()?.run()
    }

    pub fn migration_status(&self) -> Result<Option<MigrationStats>> {
        self.migrator()?.status()
    }

    fn migrator(&self) -> Result<Migrator> {
        if !self.report.is_available(TierId::ExtensionPersistent) {
            return Err(StoreError::BackendUnavailable {
                tier: TierId::ExtensionPersistent.to_string(),
                reason: "migration target failed its probe".to_string(),
            });
        }
        let (Some(source), Some(target)) = (
            self.raw.get(TierId::PagePrimary),
            self.raw.get(TierId::ExtensionPersistent),
        ) else {
            return Err(StoreError::BackendUnavailable {
                tier: TierId::PagePrimary.to_string(),
                reason: "migration source is not configured".to_string(),
            });
        };
        Ok(Migrator::new(
            source.clone(),
            target.clone(),
            self.registry.clone(),
            &self.prefix,
            &self.config.storage.migration_flag_key,
        ))
    }

    /// Best value of every registry key.
    #[must_use]
    pub fn export_snapshot(&self) -> Snapshot {
        let entries: BTreeMap<String, Value> = self
            .registry
            .iter()
            .filter_map(|key| {
                self.loader
                    .load_detailed(key)
                    .map(|winner| (key.to_string(), winner.value))
            })
            .collect();
        info!(keys = entries.len(), "snapshot exported");
        Snapshot::new(&self.prefix, entries)
    }

    /// Save every snapshot entry under this engine's prefix.
    pub async fn import_snapshot(&self, snapshot: &Snapshot) -> Result<ImportReport> {
        snapshot.validate()?;
        let mut report = ImportReport::default();
        for (stored_key, value) in &snapshot.entries {
            let short = stored_key
                .strip_prefix(snapshot.prefix.as_str())
                .unwrap_or(stored_key);
            let key = LogicalKey::prefixed(short, &self.prefix);
            match self.save(key.as_str(), value).await {
                Ok(_) => report.restored.push(key.to_string()),
                Err(e) => {
                    warn!(key = %key, error = %e, "snapshot entry not restored");
                    report.failed.push(key.to_string());
                }
            }
        }
        info!(
            restored = report.restored.len(),
            failed = report.failed.len(),
            "snapshot imported"
        );
        Ok(report)
    }

    /// A non-empty save to a tombstoned key lifts the tombstone.
    fn should_lift(&self, key: &LogicalKey, prepared: &PreparedWrite) -> bool {
        self.tombstones.suppresses(key.as_str())
            && decode(&prepared.text)
                .and_then(StoredValue::from_json)
                .is_some_and(|value| !value.is_empty())
    }

    /// Write and verify `prepared`. With `lift`, the tombstone is lifted for
    /// the read-back and set again if the save fails, so a failed write can
    /// never expose stale replicas.
    async fn commit(&self, key: &LogicalKey, prepared: PreparedWrite, lift: bool) -> Result<WriteReceipt> {
        let text = prepared.text.clone();
        let lifted = lift && self.tombstones.lift(key.as_str());
        let receipt = match self.writer.save_prepared(key, prepared).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if lifted {
                    warn!(key = %key, "save failed, restoring tombstone");
                    self.tombstones.restore(key.as_str());
                }
                return Err(e);
            }
        };

        if lifted {
            debug!(key = %key, "tombstone lifted by verified save");
            self.broadcast(key, &text);
        }
        if !receipt.overflow.is_empty() {
            if let Err(e) = self.archive(key, &receipt.overflow).await {
                warn!(key = %key, error = %e, "log overflow not archived");
            }
        }
        Ok(receipt)
    }

    /// After a tombstone lift, overwrite stale copies on the other replicas
    /// so best-of-N cannot resurrect cleared records.
    fn broadcast(&self, key: &LogicalKey, text: &str) {
        for tier in TierId::REPLICAS {
            let Some(backend) = self.guarded.get(tier) else {
                continue;
            };
            if let Err(e) = backend.set(key.as_str(), text) {
                debug!(%tier, key = %key, error = %e, "post-lift broadcast skipped");
            }
        }
    }

    async fn archive(&self, key: &LogicalKey, overflow: &[LogEntry]) -> Result<()> {
        let Some(policy) = self.schemas.log_policy(key.as_str()) else {
            return Ok(());
        };
        let existing = entries_from_json(
            &self
                .loader
                .load(&policy.archive_key, Value::Array(Vec::new())),
        );
        let merged = archive_overflow(&existing, overflow, policy.max_in_storage);
        debug!(
            key = %policy.archive_key,
            moved = overflow.len(),
            total = merged.len(),
            "archiving log overflow"
        );
        self.writer
            .save(&policy.archive_key, &entries_to_json(&merged))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::backend::mock::MockFault;
    use crate::backend::MockBackend;

    struct Fixture {
        ext: Arc<MockBackend>,
        page: Arc<MockBackend>,
        alt: Arc<MockBackend>,
        engine: StorageEngine,
    }

    fn fixture_with(config: Config) -> Fixture {
        let ext = Arc::new(MockBackend::new(TierId::ExtensionPersistent));
        let page = Arc::new(MockBackend::new(TierId::PagePrimary));
        let alt = Arc::new(MockBackend::new(TierId::PageSecondary));
        let engine = StorageEngine::builder(config)
            .backend(ext.clone())
            .backend(page.clone())
            .backend(alt.clone())
            .build();
        Fixture {
            ext,
            page,
            alt,
            engine,
        }
    }

    fn fixture() -> Fixture {
        let mut config = Config::default();
        config.write.retry_delay_ms = 1;
        fixture_with(config)
    }

    fn record(kind: &str, ts: i64) -> LogEntry {
        LogEntry::new(kind, "Rex", ts)
    }

    #[test]
    fn test_build_selects_extension_and_adds_memory() {
        let f = fixture();
        assert_eq!(f.engine.selected_tier(), TierId::ExtensionPersistent);
        assert!(f.engine.probe_report().is_available(TierId::Memory));
        assert_eq!(f.engine.registry().len(), 15);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let f = fixture();
        assert!(f.engine.save_namespaced("NS_settings", &json!({"theme": "dark"})).await);
        assert_eq!(
            f.engine.load_namespaced("NS_settings", Value::Null),
            json!({"theme": "dark"})
        );
        assert!(f.page.raw("NS_settings").is_some());
        assert_eq!(f.alt.raw("NS_settings"), None);
    }

    #[tokio::test]
    async fn test_unprefixed_key_is_corrected() {
        let f = fixture();
        assert!(f.engine.save_namespaced("petPresets", &json!({"a": {}})).await);
        assert!(f.ext.raw("NS_petPresets").is_some());
        assert_eq!(f.ext.raw("petPresets"), None);
        assert_eq!(f.engine.load_namespaced("petPresets", Value::Null), json!({"a": {}}));
    }

    #[tokio::test]
    async fn test_hard_clear_is_sticky_until_new_record() {
        let f = fixture();
        f.engine
            .append_logs("petAbilityLogs", vec![record("a", 1), record("b", 2)])
            .await
            .unwrap();

        let cleared = f.engine.hard_clear("petAbilityLogs");
        assert!(cleared.errors.is_empty());
        assert_eq!(f.ext.raw("NS_petAbilityLogs"), None);

        f.alt.put_raw("NS_petAbilityLogs", &entries_to_json(&[record("old", 0)]).to_string());
        assert_eq!(f.engine.load_namespaced("petAbilityLogs", json!([])), json!([]));
        assert!(f.engine.load_all_logs("petAbilityLogs").is_empty());

        let outcome = f
            .engine
            .append_logs("petAbilityLogs", vec![record("fresh", 9)])
            .await
            .unwrap();
        assert!(outcome.tombstone_lifted);
        let logs = f.engine.load_all_logs("petAbilityLogs");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, "fresh");
        assert!(f.engine.tombstones().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_append_writes_nothing() {
        let f = fixture();
        f.engine
            .append_logs("petAbilityLogs", vec![record("a", 1)])
            .await
            .unwrap();
        let before = f.ext.total_set_calls();
        let outcome = f
            .engine
            .append_logs("petAbilityLogs", vec![record("a", 1)])
            .await
            .unwrap();
        assert_eq!(outcome.added, 0);
        assert!(outcome.receipt.is_none());
        assert_eq!(f.ext.total_set_calls(), before);
    }

    #[tokio::test]
    async fn test_overflow_moves_to_archive() {
        let mut config = Config::default();
        config.write.retry_delay_ms = 1;
        config.logs.max_in_main = 2;
        config.logs.max_in_storage = 2;
        let f = fixture_with(config);

        let records: Vec<LogEntry> = (1..=5).map(|ts| record("t", ts)).collect();
        f.engine.append_logs("petAbilityLogs", records).await.unwrap();

        let main = entries_from_json(&f.engine.load_namespaced("petAbilityLogs", json!([])));
        assert_eq!(main.iter().map(|e| e.timestamp).collect::<Vec<_>>(), vec![5, 4]);
        let all = f.engine.load_all_logs("petAbilityLogs");
        assert_eq!(all.iter().map(|e| e.timestamp).collect::<Vec<_>>(), vec![5, 4, 3, 2]);
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let f = fixture();
        f.engine.save("hotkeys", &json!({"k": "x"})).await.unwrap();
        let snapshot = f.engine.export_snapshot();
        assert_eq!(snapshot.entries.get("NS_hotkeys"), Some(&json!({"k": "x"})));

        let other = fixture();
        let report = other.engine.import_snapshot(&snapshot).await.unwrap();
        assert_eq!(report.restored, vec!["NS_hotkeys".to_string()]);
        assert_eq!(other.engine.load_namespaced("hotkeys", Value::Null), json!({"k": "x"}));
    }

    #[tokio::test]
    async fn test_fallback_tier_when_extension_blocked() {
        let ext = Arc::new(MockBackend::new(TierId::ExtensionPersistent).with_fault(MockFault::Blocked));
        let page = Arc::new(MockBackend::new(TierId::PagePrimary));
        let engine = StorageEngine::builder(Config::default())
            .backend(ext)
            .backend(page.clone())
            .build();
        assert_eq!(engine.selected_tier(), TierId::PagePrimary);
        assert!(engine.save_namespaced("data", &json!({"x": 1})).await);
        assert_eq!(page.raw("NS_data").as_deref(), Some("{\"x\":1}"));
        assert!(engine.migrate_to_persistent().is_err());
    }

    #[test]
    fn test_tombstones_survive_rebuild() {
        let ext = Arc::new(MockBackend::new(TierId::ExtensionPersistent));
        let first = StorageEngine::builder(Config::default()).backend(ext.clone()).build();
        first.hard_clear("petAbilityLogs");
        drop(first);

        ext.put_raw("NS_petAbilityLogs", "[{\"type\":\"a\",\"subject\":\"b\",\"timestamp\":1}]");
        let second = StorageEngine::builder(Config::default()).backend(ext).build();
        assert_eq!(second.tombstones(), vec!["NS_petAbilityLogs".to_string()]);
        assert_eq!(second.load_namespaced("petAbilityLogs", json!("none")), json!("none"));
    }
}
