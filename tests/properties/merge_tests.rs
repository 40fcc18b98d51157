use proptest::prelude::*;

use tierkv::logs::{entries_from_json, entries_to_json, merge, normalize, LogEntry};

fn arb_entry() -> impl Strategy<Value = LogEntry> {
    ("[A-Za-z]{1,8}", "[A-Za-z ]{0,12}", 0i64..50).prop_map(|(kind, subject, ts)| LogEntry::new(kind, subject, ts))
}

proptest! {
    #[test]
    fn merge_is_idempotent(existing in prop::collection::vec(arb_entry(), 0..20),
                           incoming in prop::collection::vec(arb_entry(), 0..20)) {
        let once = merge(&existing, &incoming);
        let twice = merge(&once.entries, &incoming);
        prop_assert_eq!(twice.added, 0);
        prop_assert_eq!(&twice.entries, &once.entries);
    }

    #[test]
    fn merged_entries_are_unique_and_newest_first(batch in prop::collection::vec(arb_entry(), 0..30)) {
        let entries = normalize(&batch);
        let mut keys: Vec<String> = entries.iter().map(LogEntry::dedup_key).collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), entries.len());
        prop_assert!(entries.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn added_counts_only_new_records(existing in prop::collection::vec(arb_entry(), 0..15),
                                    incoming in prop::collection::vec(arb_entry(), 0..15)) {
        let base = normalize(&existing);
        let outcome = merge(&base, &incoming);
        prop_assert_eq!(outcome.entries.len(), base.len() + outcome.added);
    }

    #[test]
    fn json_round_trip_preserves_records(batch in prop::collection::vec(arb_entry(), 0..10)) {
        let back = entries_from_json(&entries_to_json(&batch));
        prop_assert_eq!(back, batch);
    }
}
