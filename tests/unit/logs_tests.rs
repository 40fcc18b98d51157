use serde_json::json;
use tierkv::logs::{
    archive_overflow, entries_from_json, entries_to_json, fingerprint, merge, normalize,
    split_overflow, LogEntry,
};

fn entry(kind: &str, ts: i64) -> LogEntry {
    LogEntry::new(kind, "Rex", ts)
}

fn timestamps(entries: &[LogEntry]) -> Vec<i64> {
    entries.iter().map(|e| e.timestamp).collect()
}

#[test]
fn fingerprint_is_stable_base36() {
    let a = fingerprint("ProduceScaleBoost", "Rex", 1_700_000_000_000);
    let b = fingerprint("ProduceScaleBoost", "Rex", 1_700_000_000_000);
    assert_eq!(a, b);
    assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    assert_ne!(a, fingerprint("ProduceScaleBoost", "Rex", 1_700_000_000_001));
}

#[test]
fn merge_is_newest_first_and_counts_new_records() {
    let existing = vec![entry("a", 1), entry("b", 3)];
    let incoming = vec![entry("b", 3), entry("c", 2)];
    let outcome = merge(&existing, &incoming);
    assert_eq!(outcome.added, 1);
    assert_eq!(timestamps(&outcome.entries), vec![3, 2, 1]);
}

#[test]
fn explicit_id_overrides_fingerprint() {
    let first = entry("a", 1).with_id("x1");
    let same_id = entry("different", 5).with_id("x1");
    let outcome = merge(&[first], &[same_id]);
    assert_eq!(outcome.added, 0);
    assert_eq!(outcome.entries.len(), 1);
}

#[test]
fn normalize_collapses_duplicates_in_one_batch() {
    let batch = vec![entry("a", 1), entry("a", 1), entry("b", 2)];
    assert_eq!(timestamps(&normalize(&batch)), vec![2, 1]);
}

#[test]
fn split_keeps_newest_in_main() {
    let entries = normalize(&[entry("a", 1), entry("b", 2), entry("c", 3)]);
    let (main, overflow) = split_overflow(entries, 2);
    assert_eq!(timestamps(&main), vec![3, 2]);
    assert_eq!(timestamps(&overflow), vec![1]);
}

#[test]
fn archive_respects_cap() {
    let archive = vec![entry("old", 1)];
    let overflow = vec![entry("x", 4), entry("y", 3)];
    let merged = archive_overflow(&archive, &overflow, 2);
    assert_eq!(timestamps(&merged), vec![4, 3]);
}

#[test]
fn legacy_field_names_are_accepted() {
    let value = json!([
        {"abilityType": "Rainbow", "petName": "Ada", "timestamp": 10, "color": "red"},
        "not a record"
    ]);
    let entries = entries_from_json(&value);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, "Rainbow");
    assert_eq!(entries[0].subject, "Ada");
    assert_eq!(entries[0].extra["color"], "red");

    let back = entries_to_json(&entries);
    assert_eq!(back[0]["type"], "Rainbow");
    assert_eq!(back[0]["color"], "red");
}
