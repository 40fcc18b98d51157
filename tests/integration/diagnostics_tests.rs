use serde_json::json;
use tierkv::backend::mock::MockFault;
use tierkv::backend::TierId;
use tierkv::test_utils::fixtures::EngineFixture;

#[tokio::test]
async fn scan_reports_each_physical_copy() {
    let f = EngineFixture::new();
    f.engine.save("petPresetsOrder", &json!(["a", "b"])).await.unwrap();
    f.alt.put_raw("NS_petPresetsOrder", "\"[\\\"a\\\"]\"");

    let report = f.engine.scan_all_locations("petPresetsOrder");
    assert!(!report.tombstoned);
    assert_eq!(
        report.found_in(),
        vec![TierId::ExtensionPersistent, TierId::PagePrimary, TierId::PageSecondary]
    );

    let alt = report
        .locations
        .iter()
        .find(|l| l.tier == TierId::PageSecondary)
        .unwrap();
    assert_eq!(alt.data_type, Some("array"));
    assert_eq!(alt.item_count, Some(1));
    assert!(!alt.corrupted);
}

#[test]
fn scan_flags_corrupt_text_and_ignores_tombstones() {
    let f = EngineFixture::new();
    f.page.put_raw("NS_settings", "{not json");
    f.ext.put_raw("NS_petAbilityLogs", "[{\"type\":\"a\",\"subject\":\"b\",\"timestamp\":1}]");

    let settings = f.engine.scan_all_locations("settings");
    let page = settings
        .locations
        .iter()
        .find(|l| l.tier == TierId::PagePrimary)
        .unwrap();
    assert!(page.found && page.corrupted);
    assert_eq!(page.preview.as_deref(), Some("{not json"));

    // Scans read the raw tiers, so a tombstoned key still shows its bytes.
    f.engine.hard_clear("petAbilityLogs");
    f.ext.put_raw("NS_petAbilityLogs", "[1,2]");
    let logs = f.engine.scan_all_locations("petAbilityLogs");
    assert!(logs.tombstoned);
    assert_eq!(logs.found_in(), vec![TierId::ExtensionPersistent]);
}

#[test]
fn health_check_reports_failing_tiers() {
    let f = EngineFixture::new();
    let healthy = f.engine.health_check();
    assert!(healthy.is_healthy());
    assert_eq!(healthy.selected, TierId::ExtensionPersistent);
    assert!(healthy.write_tests.iter().all(|t| t.passed));

    f.alt.inject(MockFault::DropWrites);
    let report = f.engine.health_check();
    assert!(!report.is_healthy());
    let failed: Vec<_> = report
        .write_tests
        .iter()
        .filter(|t| !t.passed)
        .map(|t| t.tier)
        .collect();
    assert_eq!(failed, vec![TierId::PageSecondary]);
    assert_eq!(f.alt.raw("NS_health_check_test"), None);
}
