use serde_json::json;
use tierkv::config::Config;
use tierkv::schema::{decode, SchemaRegistry, Shape, ABSENT_SCORE};

#[test]
fn decode_unwraps_one_level_of_string_encoding() {
    assert_eq!(decode(r#""[1,2,3]""#), Some(json!([1, 2, 3])));
    assert_eq!(decode(r#""{\"a\":1}""#), Some(json!({"a": 1})));
    assert_eq!(decode(r#""plain""#), Some(json!("plain")));
}

#[test]
fn decode_treats_markers_as_absent() {
    assert_eq!(decode(""), None);
    assert_eq!(decode("null"), None);
    assert_eq!(decode("undefined"), None);
    assert_eq!(decode("{broken"), None);
}

#[test]
fn registry_scores_by_declared_shape() {
    let registry = SchemaRegistry::from_config(&Config::default());
    let presets = registry.get("NS_petPresets");
    assert_eq!(presets.shape, Shape::Map);
    assert!(presets.critical);
    assert_eq!(presets.score(r#"{"a":{},"b":{}}"#), 2);
    assert_eq!(presets.score("[1,2,3]"), ABSENT_SCORE);
    assert_eq!(presets.score("{}"), ABSENT_SCORE);
}

#[test]
fn log_keys_carry_overflow_policy() {
    let registry = SchemaRegistry::from_config(&Config::default());
    let policy = registry.log_policy("NS_petAbilityLogs").expect("log key");
    assert_eq!(policy.archive_key.as_str(), "NS_petAbilityLogs_archive");
    assert_eq!(policy.max_in_main, 1000);
    assert!(registry.log_policy("NS_settings").is_none());
}

#[test]
fn unknown_keys_accept_any_shape() {
    let registry = SchemaRegistry::from_config(&Config::default());
    let schema = registry.get("NS_somethingElse");
    assert_eq!(schema.shape, Shape::Any);
    assert_eq!(schema.score("42"), 1);
    assert_eq!(schema.score("[1]"), 1);
}
