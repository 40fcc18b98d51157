use tierkv::key::LogicalKey;
use tierkv::test_utils::{run_table_tests, TestCase};

#[test]
fn enforce_adds_missing_prefix() {
    let cases = vec![
        TestCase {
            name: "already_prefixed",
            input: "NS_settings",
            expected: "NS_settings".to_string(),
        },
        TestCase {
            name: "missing_prefix",
            input: "settings",
            expected: "NS_settings".to_string(),
        },
        TestCase {
            name: "lowercase_is_not_the_prefix",
            input: "ns_settings",
            expected: "NS_ns_settings".to_string(),
        },
        TestCase {
            name: "empty_key",
            input: "",
            expected: "NS_".to_string(),
        },
    ];

    run_table_tests(cases, |raw| LogicalKey::enforce(raw, "NS_").to_string());
}

#[test]
fn short_strips_prefix_once() {
    let key = LogicalKey::prefixed("NS_NS_x", "NS_");
    assert_eq!(key.as_str(), "NS_NS_x");
    assert_eq!(key.short("NS_"), "NS_x");
}

#[test]
fn archive_appends_suffix() {
    let key = LogicalKey::prefixed("petAbilityLogs", "NS_");
    assert_eq!(key.archive("_archive").as_str(), "NS_petAbilityLogs_archive");
}
