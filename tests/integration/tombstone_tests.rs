use serde_json::json;
use tierkv::backend::mock::MockFault;
use tierkv::logs::{entries_from_json, entries_to_json, LogEntry};
use tierkv::test_utils::fixtures::EngineFixture;

fn record(kind: &str, ts: i64) -> LogEntry {
    LogEntry::new(kind, "Rex", ts)
}

#[tokio::test]
async fn hard_clear_survives_restart_and_stale_replicas() {
    let f = EngineFixture::new();
    f.engine
        .append_logs("petAbilityLogs", vec![record("a", 1), record("b", 2)])
        .await
        .unwrap();

    let report = f.engine.hard_clear("petAbilityLogs");
    assert!(report.errors.is_empty());
    assert_eq!(report.archive, "NS_petAbilityLogs_archive");

    let stale = entries_to_json(&[record("stale", 0)]).to_string();
    f.alt.put_raw("NS_petAbilityLogs", &stale);

    let f = f.restart();
    assert_eq!(f.engine.tombstones(), vec!["NS_petAbilityLogs".to_string()]);
    assert_eq!(f.engine.load_namespaced("petAbilityLogs", json!([])), json!([]));
    assert!(f.engine.scan_all_locations("petAbilityLogs").tombstoned);
}

#[tokio::test]
async fn new_record_lifts_tombstone_and_overwrites_stale_copies() {
    let f = EngineFixture::new();
    f.engine.hard_clear("petAbilityLogs");
    let stale = entries_to_json(&[record("stale", 0), record("older", -1)]).to_string();
    f.alt.put_raw("NS_petAbilityLogs", &stale);

    let outcome = f
        .engine
        .append_logs("petAbilityLogs", vec![record("fresh", 5)])
        .await
        .unwrap();
    assert!(outcome.tombstone_lifted);
    assert!(f.engine.tombstones().is_empty());

    let logs = f.engine.load_all_logs("petAbilityLogs");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, "fresh");
    assert_eq!(f.alt.raw("NS_petAbilityLogs"), f.ext.raw("NS_petAbilityLogs"));
}

#[tokio::test]
async fn empty_save_keeps_tombstone() {
    let f = EngineFixture::new();
    f.engine.hard_clear("petAbilityLogs");
    assert!(f.engine.save("petAbilityLogs", &json!([])).await.is_ok());
    assert_eq!(f.engine.tombstones(), vec!["NS_petAbilityLogs".to_string()]);

    f.engine.hard_clear("settings");
    f.engine.save("settings", &json!({"a": 1})).await.unwrap();
    assert_eq!(f.engine.tombstones(), vec!["NS_petAbilityLogs".to_string()]);
    assert_eq!(f.engine.load_namespaced("settings", json!(null)), json!({"a": 1}));
}

#[tokio::test]
async fn cleared_collection_takes_back_old_records() {
    let f = EngineFixture::new();
    f.engine
        .append_logs("petAbilityLogs", vec![record("a", 1)])
        .await
        .unwrap();
    f.engine.hard_clear("petAbilityLogs");

    let mut collection = f.engine.log_collection("petAbilityLogs");
    assert_eq!(collection.len(), 0);
    assert!(!collection.lifts_tombstone());
    assert_eq!(collection.extend(vec![record("a", 1), record("a", 1)]), 1);
    assert!(collection.lifts_tombstone());
    assert_eq!(f.engine.tombstones(), vec!["NS_petAbilityLogs".to_string()]);

    f.engine.commit_logs(collection).await.unwrap();
    assert!(f.engine.tombstones().is_empty());
    assert_eq!(f.engine.load_all_logs("petAbilityLogs").len(), 1);
}

#[tokio::test]
async fn failed_append_keeps_tombstone_and_hides_stale_copies() {
    let f = EngineFixture::new();
    f.engine.hard_clear("petAbilityLogs");
    let stale = entries_to_json(&[record("stale", 0), record("stale", 1), record("stale", 2)]).to_string();
    f.alt.put_raw("NS_petAbilityLogs", &stale);
    f.ext.inject(MockFault::DropWrites);

    let result = f
        .engine
        .append_logs("petAbilityLogs", vec![record("fresh", 9)])
        .await;
    assert!(result.is_err());
    assert_eq!(f.engine.tombstones(), vec!["NS_petAbilityLogs".to_string()]);
    assert_eq!(f.engine.load_namespaced("petAbilityLogs", json!([])), json!([]));

    f.ext.heal();
    let outcome = f
        .engine
        .append_logs("petAbilityLogs", vec![record("fresh", 9)])
        .await
        .unwrap();
    assert!(outcome.tombstone_lifted);
    let logs = entries_from_json(&f.engine.load_namespaced("petAbilityLogs", json!([])));
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, "fresh");
}

#[tokio::test]
async fn failed_save_restores_tombstone() {
    let f = EngineFixture::new();
    f.engine.hard_clear("petPresets");
    f.ext.inject(MockFault::DropWrites);

    assert!(f.engine.save("petPresets", &json!({"a": {}})).await.is_err());
    assert_eq!(f.engine.tombstones(), vec!["NS_petPresets".to_string()]);
}
