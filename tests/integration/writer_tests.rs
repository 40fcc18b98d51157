use std::sync::Arc;

use serde_json::json;
use tierkv::backend::mock::MockFault;
use tierkv::backend::{MockBackend, TierId};
use tierkv::error::ErrorCode;
use tierkv::test_utils::fixtures::{fast_config, EngineFixture};
use tierkv::writer::WritePath;
use tierkv::StoreError;

#[tokio::test]
async fn quota_error_purges_caches_and_retries_exactly_once() {
    let f = EngineFixture::new();
    f.ext.put_raw("temp-cache", "big");
    f.page.put_raw("console-history", "bigger");
    f.alt.put_raw("debug-cache", "biggest");
    f.ext.inject(MockFault::QuotaOnSet(1));

    let receipt = f.engine.save("data", &json!({"coins": 10})).await.unwrap();
    assert!(receipt.quota_recovered);
    assert_eq!(f.ext.set_calls("NS_data"), 2);
    assert_eq!(f.ext.raw("NS_data").as_deref(), Some(r#"{"coins":10}"#));
    assert_eq!(f.ext.raw("temp-cache"), None);
    assert_eq!(f.page.raw("console-history"), None);
    assert_eq!(f.alt.raw("debug-cache"), None);
}

#[tokio::test]
async fn second_quota_error_is_final() {
    let f = EngineFixture::new();
    f.ext.inject(MockFault::QuotaOnSet(10));

    let err = f.engine.save("petPresets", &json!({"p": {}})).await.unwrap_err();
    assert!(matches!(err, StoreError::QuotaExceeded { .. }));
    assert_eq!(err.code(), ErrorCode::QuotaExceeded);
    assert_eq!(f.ext.set_calls("NS_petPresets"), 2);

    let alerts = f.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].code, ErrorCode::QuotaExceeded);
}

#[tokio::test]
async fn verification_mismatch_exhausts_attempts() {
    let f = EngineFixture::new();
    f.ext.inject(MockFault::CorruptWrites);

    let err = f.engine.save("petPresets", &json!({"p": {}})).await.unwrap_err();
    assert!(matches!(err, StoreError::WriteVerificationFailed { attempts: 3, .. }));
    assert_eq!(f.ext.set_calls("NS_petPresets"), 3);
    assert_eq!(f.alerts.count(), 1);
    assert!(f.alerts.alerts()[0].message.contains("petPresets"));
}

#[tokio::test]
async fn non_critical_failures_do_not_alert() {
    let f = EngineFixture::new();
    f.ext.inject(MockFault::DropWrites);

    assert!(!f.engine.save_namespaced("settings", &json!({"a": 1})).await);
    assert_eq!(f.alerts.count(), 0);
}

#[tokio::test]
async fn saves_mirror_to_primary_page_only() {
    let f = EngineFixture::new();
    let receipt = f.engine.save("settings", &json!({"a": 1})).await.unwrap();
    assert_eq!(receipt.path, WritePath::Primary);
    assert!(receipt.mirrored);
    assert_eq!(f.page.raw("NS_settings").as_deref(), Some(r#"{"a":1}"#));
    assert_eq!(f.alt.raw("NS_settings"), None);
}

#[tokio::test]
async fn unreachable_extension_falls_back_to_page() {
    let ext = Arc::new(MockBackend::new(TierId::ExtensionPersistent).with_fault(MockFault::Blocked));
    let page = Arc::new(MockBackend::new(TierId::PagePrimary));
    let alt = Arc::new(MockBackend::new(TierId::PageSecondary));
    let f = EngineFixture::from_parts(fast_config(), ext, page, alt);

    assert_eq!(f.engine.selected_tier(), TierId::PagePrimary);
    let receipt = f.engine.save("settings", &json!({"a": 1})).await.unwrap();
    assert_eq!(receipt.path, WritePath::Fallback);
    assert_eq!(f.page.raw("NS_settings").as_deref(), Some(r#"{"a":1}"#));
    assert_eq!(f.engine.load_namespaced("settings", json!(null)), json!({"a": 1}));
}

#[tokio::test]
async fn wrong_shape_is_rejected_before_writing() {
    let f = EngineFixture::new();
    let err = f.engine.save("settings", &json!([1, 2])).await.unwrap_err();
    assert!(matches!(err, StoreError::ShapeMismatch { .. }));
    assert_eq!(f.ext.set_calls("NS_settings"), 0);
}

#[tokio::test]
async fn log_overflow_moves_oldest_to_archive() {
    let mut config = fast_config();
    config.logs.max_in_main = 2;
    let f = EngineFixture::with_config(config);
    let records: Vec<_> = (1..=4)
        .map(|ts| tierkv::logs::LogEntry::new("Gold", "Rex", ts))
        .collect();

    let outcome = f.engine.append_logs("petAbilityLogs", records).await.unwrap();
    assert_eq!(outcome.added, 4);

    let main = f.engine.load_namespaced("petAbilityLogs", json!([]));
    assert_eq!(main.as_array().map(Vec::len), Some(2));
    let archive = f.engine.load_namespaced("petAbilityLogs_archive", json!([]));
    assert_eq!(archive.as_array().map(Vec::len), Some(2));
    let all: Vec<i64> = f
        .engine
        .load_all_logs("petAbilityLogs")
        .iter()
        .map(|e| e.timestamp)
        .collect();
    assert_eq!(all, vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn loose_log_fields_survive_save_and_load() {
    let f = EngineFixture::new();
    let value = json!([
        {"type": "e", "subject": "f", "timestamp": null},
        {"type": null, "subject": "f", "timestamp": 1.5},
        {"type": "e", "subject": "f", "timestamp": 3}
    ]);
    f.engine.save("petAbilityLogs", &value).await.unwrap();

    let loaded = f.engine.load_namespaced("petAbilityLogs", json!([]));
    let stamps: Vec<_> = loaded
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["timestamp"].clone())
        .collect();
    assert_eq!(stamps, vec![json!(3), json!(1), json!(0)]);
    assert_eq!(loaded[1]["type"], json!(""));
}

#[tokio::test]
async fn non_record_log_item_is_rejected() {
    let f = EngineFixture::new();
    let err = f
        .engine
        .save("petAbilityLogs", &json!([{"type": "a", "timestamp": 1}, "oops"]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParseError);
    assert_eq!(f.ext.raw("NS_petAbilityLogs"), None);
}
