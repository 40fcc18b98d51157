use serde_json::json;
use tierkv::backend::TierId;
use tierkv::test_utils::fixtures::DiskFixture;
use tierkv::writer::WritePath;

#[tokio::test]
async fn values_survive_a_new_engine() {
    let fixture = DiskFixture::new();
    let engine = fixture.engine();
    assert_eq!(engine.selected_tier(), TierId::ExtensionPersistent);

    let receipt = engine
        .save("petPresets", &json!({"farm": {"slots": [1, 2]}}))
        .await
        .unwrap();
    assert!(receipt.mirrored);
    drop(engine);

    let engine = fixture.engine();
    let winner = engine.load_detailed("petPresets").unwrap();
    assert_eq!(winner.origin, TierId::ExtensionPersistent);
    assert_eq!(winner.value, json!({"farm": {"slots": [1, 2]}}));

    let page = std::fs::read_to_string(fixture.data_dir.join("page.json")).unwrap();
    assert!(page.contains("NS_petPresets"));
}

#[tokio::test]
async fn page_tier_serves_when_extension_is_disabled() {
    let mut fixture = DiskFixture::new();
    fixture.config.tiers.extension = false;
    let engine = fixture.engine();
    assert_eq!(engine.selected_tier(), TierId::PagePrimary);

    let receipt = engine.save("settings", &json!({"theme": "dark"})).await.unwrap();
    assert_eq!(receipt.path, WritePath::Fallback);
    assert!(!fixture.data_dir.join("extension.db").exists());
    assert_eq!(engine.load_namespaced("settings", json!(null)), json!({"theme": "dark"}));
}

#[tokio::test]
async fn migration_moves_page_data_once() {
    let mut fixture = DiskFixture::new();
    fixture.config.tiers.extension = false;
    let page_only = fixture.engine();
    page_only.save("hotkeys", &json!({"save": "ctrl+s"})).await.unwrap();
    drop(page_only);

    fixture.config.tiers.extension = true;
    let engine = fixture.engine();
    assert_eq!(engine.migration_status().unwrap(), None);

    let report = engine.migrate_to_persistent().unwrap();
    assert!(!report.already_completed);
    assert_eq!(report.migrated, vec!["NS_hotkeys".to_string()]);
    assert!(report.failed.is_empty());

    let winner = engine.load_detailed("hotkeys").unwrap();
    assert_eq!(winner.origin, TierId::ExtensionPersistent);
    assert_eq!(winner.value, json!({"save": "ctrl+s"}));

    let stats = engine.migration_status().unwrap().unwrap();
    assert_eq!(stats.migrated_count, 1);

    let again = engine.migrate_to_persistent().unwrap();
    assert!(again.already_completed);
    assert!(again.migrated.is_empty());
}

#[tokio::test]
async fn page_quota_is_enforced_on_disk() {
    let mut fixture = DiskFixture::new();
    fixture.config.tiers.extension = false;
    fixture.config.tiers.page_quota_bytes = 256;
    let engine = fixture.engine();

    let big = "x".repeat(512);
    let err = engine.save("data", &json!({ "blob": big })).await.unwrap_err();
    assert!(err.is_quota());
}
