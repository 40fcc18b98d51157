use tierkv::config::Config;
use tierkv::schema::Shape;
use tierkv::test_utils::fixtures::DiskFixture;
use tierkv::StoreError;

#[test]
fn defaults_are_valid() {
    let config = Config::default();
    assert_eq!(config.storage.namespace_prefix, "NS_");
    assert_eq!(config.write.max_attempts, 3);
    assert_eq!(config.reconcile.keys.len(), 15);
    assert_eq!(config.shapes["petPresetsOrder"], Shape::List);
}

#[test]
fn explicit_file_patches_defaults() {
    let fixture = DiskFixture::new();
    let path = fixture.create_file(
        "custom.toml",
        r#"
[write]
max_attempts = 5
critical_keys = ["settings"]

[logs]
max_in_main = 50

[shapes]
overlayPositions = "list"
"#,
    );

    let config = Config::load(Some(&path), &fixture.data_dir).unwrap();
    assert_eq!(config.write.max_attempts, 5);
    assert_eq!(config.write.retry_delay_ms, 100);
    assert_eq!(config.write.critical_keys, vec!["settings".to_string()]);
    assert_eq!(config.logs.max_in_main, 50);
    assert_eq!(config.logs.max_in_storage, 10_000);
    assert_eq!(config.shapes["overlayPositions"], Shape::List);
    assert_eq!(config.shapes["settings"], Shape::Map);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let fixture = DiskFixture::new();
    let err = Config::load(Some(&fixture.data_dir.join("nope.toml")), &fixture.data_dir).unwrap_err();
    assert!(matches!(err, StoreError::ConfigNotFound(_)));
}

#[test]
fn invalid_values_are_rejected() {
    let fixture = DiskFixture::new();
    let path = fixture.create_file("bad.toml", "[write]\nmax_attempts = 0\n");
    assert!(matches!(
        Config::load(Some(&path), &fixture.data_dir).unwrap_err(),
        StoreError::Config(_)
    ));

    let path = fixture.create_file("broken.toml", "[write\n");
    assert!(matches!(
        Config::load(Some(&path), &fixture.data_dir).unwrap_err(),
        StoreError::Config(_)
    ));
}
