use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use tierkv::backend::{MockBackend, TierId};
use tierkv::test_utils::fixtures::{fast_config, EngineFixture};

const KEY: &str = "NS_petPresetsOrder";

fn mock(tier: TierId, len: Option<usize>) -> Arc<MockBackend> {
    let backend = MockBackend::new(tier);
    let backend = match len {
        Some(len) => {
            let items: Vec<Value> = (0..len).map(|i| json!(format!("{tier}-{i}"))).collect();
            backend.with_value(KEY, &Value::Array(items).to_string())
        }
        None => backend,
    };
    Arc::new(backend)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn winner_has_max_size_and_highest_priority(ext in prop::option::of(0usize..6),
                                                page in prop::option::of(0usize..6),
                                                alt in prop::option::of(0usize..6)) {
        let f = EngineFixture::from_parts(
            fast_config(),
            mock(TierId::ExtensionPersistent, ext),
            mock(TierId::PagePrimary, page),
            mock(TierId::PageSecondary, alt),
        );
        let sizes = [
            (TierId::ExtensionPersistent, ext.unwrap_or(0)),
            (TierId::PagePrimary, page.unwrap_or(0)),
            (TierId::PageSecondary, alt.unwrap_or(0)),
        ];
        let best = sizes.iter().map(|(_, n)| *n).max().unwrap_or(0);

        let winner = f.engine.load_detailed(KEY);
        if best == 0 {
            prop_assert!(winner.is_none());
        } else {
            let expected = sizes.iter().find(|(_, n)| *n == best).map(|(t, _)| *t);
            let winner = winner.unwrap();
            prop_assert_eq!(Some(winner.origin), expected);
            prop_assert_eq!(winner.score as usize, best);
        }
    }

    #[test]
    fn loading_leaves_every_tier_untouched(ext in prop::option::of(0usize..4),
                                           page in prop::option::of(0usize..4)) {
        let f = EngineFixture::from_parts(
            fast_config(),
            mock(TierId::ExtensionPersistent, ext),
            mock(TierId::PagePrimary, page),
            mock(TierId::PageSecondary, None),
        );
        let before = (f.ext.snapshot(), f.page.snapshot(), f.alt.snapshot());
        let _ = f.engine.load_namespaced(KEY, Value::Null);
        let _ = f.engine.load_all_logs(KEY);
        prop_assert_eq!((f.ext.snapshot(), f.page.snapshot(), f.alt.snapshot()), before);
    }
}

#[tokio::test]
async fn saved_values_load_back() {
    let f = EngineFixture::new();
    for value in [json!({"a": 1}), json!({"nested": {"x": [1, 2, 3]}}), json!({"u": "ünïcode"})] {
        f.engine.save("settings", &value).await.unwrap();
        assert_eq!(f.engine.load_namespaced("settings", Value::Null), value);
    }
}
