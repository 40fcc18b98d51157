use std::sync::Arc;

use serde_json::{json, Value};
use tierkv::backend::mock::MockFault;
use tierkv::backend::{MockBackend, TierId};
use tierkv::test_utils::fixtures::{fast_config, EngineFixture};
use tierkv::test_utils::logging::TestLogger;

fn seeded(ext: &[(&str, &str)], page: &[(&str, &str)], alt: &[(&str, &str)]) -> EngineFixture {
    let build = |tier, values: &[(&str, &str)]| {
        Arc::new(
            values
                .iter()
                .fold(MockBackend::new(tier), |mock, (k, v)| mock.with_value(k, v)),
        )
    };
    EngineFixture::from_parts(
        fast_config(),
        build(TierId::ExtensionPersistent, ext),
        build(TierId::PagePrimary, page),
        build(TierId::PageSecondary, alt),
    )
}

#[test]
fn largest_replica_wins() {
    let log = TestLogger::new("largest_replica_wins");
    let f = seeded(
        &[("NS_petPresetsOrder", "[1,2,3]")],
        &[("NS_petPresetsOrder", "[1,2,3,4,5]")],
        &[("NS_petPresetsOrder", "[]")],
    );

    let winner = f.engine.load_detailed("NS_petPresetsOrder").unwrap();
    log.log_actual(&winner);
    assert_eq!(winner.origin, TierId::PagePrimary);
    assert_eq!(winner.score, 5);
    assert_eq!(winner.value, json!([1, 2, 3, 4, 5]));
    log.pass();
}

#[test]
fn ties_go_to_higher_priority_tier() {
    let f = seeded(
        &[("NS_settings", r#"{"a":1,"b":2}"#)],
        &[],
        &[("NS_settings", r#"{"x":1,"y":2}"#)],
    );
    let winner = f.engine.load_detailed("settings").unwrap();
    assert_eq!(winner.origin, TierId::ExtensionPersistent);
    assert_eq!(winner.value, json!({"a": 1, "b": 2}));
}

#[test]
fn corrupt_and_wrongly_shaped_copies_are_ignored() {
    let f = seeded(
        &[("NS_settings", "{broken")],
        &[("NS_settings", "[1,2,3,4,5,6]")],
        &[("NS_settings", r#"{"theme":"dark"}"#)],
    );
    let winner = f.engine.load_detailed("settings").unwrap();
    assert_eq!(winner.origin, TierId::PageSecondary);
    assert_eq!(winner.value, json!({"theme": "dark"}));
}

#[test]
fn missing_everywhere_returns_fallback() {
    let f = EngineFixture::new();
    assert_eq!(f.engine.load_namespaced("hotkeys", json!({"d": 1})), json!({"d": 1}));
    assert!(f.engine.load_detailed("hotkeys").is_none());
}

#[test]
fn load_never_writes() {
    let f = seeded(
        &[("NS_petPresetsOrder", "[1]")],
        &[("NS_petPresetsOrder", "[1,2]")],
        &[("NS_petPresetsOrder", "\"[1,2,3]\"")],
    );
    let before = (f.ext.snapshot(), f.page.snapshot(), f.alt.snapshot());
    let writes = f.ext.total_set_calls() + f.page.total_set_calls() + f.alt.total_set_calls();

    let value = f.engine.load_namespaced("petPresetsOrder", Value::Null);
    assert_eq!(value, json!([1, 2, 3]));

    assert_eq!((f.ext.snapshot(), f.page.snapshot(), f.alt.snapshot()), before);
    assert_eq!(
        f.ext.total_set_calls() + f.page.total_set_calls() + f.alt.total_set_calls(),
        writes
    );
}

#[test]
fn unreadable_tier_does_not_block_load() {
    let f = seeded(&[], &[("NS_settings", r#"{"a":1}"#)], &[]);
    f.ext.inject(MockFault::FailReads);
    assert_eq!(f.engine.load_namespaced("settings", Value::Null), json!({"a": 1}));
}

#[test]
fn reconcile_rewrites_canonical_winner_everywhere() {
    let f = seeded(
        &[("NS_petPresetsOrder", "[1]")],
        &[("NS_petPresetsOrder", "\"[1,2,3]\"")],
        &[],
    );

    let report = f.engine.reconcile_all();
    assert!(report.is_clean());
    assert_eq!(report.canonicalized.len(), 1);
    assert_eq!(report.canonicalized[0].origin, TierId::PagePrimary);
    assert_eq!(report.untouched.len(), 14);

    for mock in [&f.ext, &f.page, &f.alt] {
        assert_eq!(mock.raw("NS_petPresetsOrder").as_deref(), Some("[1,2,3]"));
    }
}

#[test]
fn reconcile_records_tier_failures() {
    let f = seeded(&[("NS_settings", r#"{"a":1}"#)], &[], &[]);
    f.alt.inject(MockFault::Blocked);

    let report = f.engine.reconcile_all();
    assert!(!report.is_clean());
    assert!(report
        .errors
        .iter()
        .all(|failure| failure.tier == TierId::PageSecondary));
    assert_eq!(f.page.raw("NS_settings").as_deref(), Some(r#"{"a":1}"#));
}
