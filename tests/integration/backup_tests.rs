use serde_json::json;
use tierkv::backup::Snapshot;
use tierkv::test_utils::fixtures::{fast_config, DiskFixture, EngineFixture};

#[tokio::test]
async fn export_then_import_under_another_prefix() {
    let source = EngineFixture::new();
    source.engine.save("settings", &json!({"theme": "dark"})).await.unwrap();
    source.engine.save("seedsToDelete", &json!(["Carrot"])).await.unwrap();

    let snapshot = source.engine.export_snapshot();
    assert_eq!(snapshot.prefix, "NS_");
    assert_eq!(snapshot.len(), 2);

    let disk = DiskFixture::new();
    let path = disk.data_dir.join("backups/snap.json");
    snapshot.write(&path).unwrap();

    let mut config = fast_config();
    config.storage.namespace_prefix = "APP_".to_string();
    let target = EngineFixture::with_config(config);
    let report = target
        .engine
        .import_snapshot(&Snapshot::read(&path).unwrap())
        .await
        .unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.restored.len(), 2);
    assert_eq!(target.ext.raw("APP_settings").as_deref(), Some(r#"{"theme":"dark"}"#));
    assert_eq!(target.ext.raw("NS_settings"), None);
    assert_eq!(
        target.engine.load_namespaced("seedsToDelete", json!(null)),
        json!(["Carrot"])
    );
}

#[tokio::test]
async fn import_reports_entries_that_fail() {
    let mut entries = std::collections::BTreeMap::new();
    entries.insert("NS_settings".to_string(), json!([1, 2]));
    entries.insert("NS_hotkeys".to_string(), json!({"save": "s"}));
    let snapshot = Snapshot::new("NS_", entries);

    let target = EngineFixture::new();
    let report = target.engine.import_snapshot(&snapshot).await.unwrap();
    assert_eq!(report.restored, vec!["NS_hotkeys".to_string()]);
    assert_eq!(report.failed, vec!["NS_settings".to_string()]);
}
