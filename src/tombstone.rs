//! Sticky clear markers for log keys.
//!
//! A tombstoned key (and its archive companion) reads as an empty list on
//! every tier until a genuinely new record is merged in. The marker set is
//! persisted as a JSON array so a restart does not resurrect cleared data.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::backend::Backend;

struct Inner {
    keys: Mutex<BTreeSet<String>>,
    archive_suffix: String,
    store: Option<(Arc<dyn Backend>, String)>,
}

/// Shared, cheaply clonable set of tombstoned keys.
#[derive(Clone)]
pub struct TombstoneRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TombstoneRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TombstoneRegistry")
            .field("keys", &*self.inner.keys.lock())
            .finish_non_exhaustive()
    }
}

impl TombstoneRegistry {
    /// Registry that lives only in this process.
    #[must_use]
    pub fn in_memory(archive_suffix: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                keys: Mutex::new(BTreeSet::new()),
                archive_suffix: archive_suffix.to_string(),
                store: None,
            }),
        }
    }

    /// Registry persisted under `store_key` in `store`. An unreadable or
    /// malformed marker list starts empty.
    #[must_use]
    pub fn persistent(store: Arc<dyn Backend>, store_key: &str, archive_suffix: &str) -> Self {
        let keys = match store.get(store_key) {
            Ok(Some(raw)) => serde_json::from_str::<BTreeSet<String>>(&raw).unwrap_or_else(|e| {
                warn!(key = store_key, error = %e, "discarding malformed tombstone list");
                BTreeSet::new()
            }),
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                warn!(tier = %store.tier(), error = %e, "tombstone list unreadable");
                BTreeSet::new()
            }
        };
        Self {
            inner: Arc::new(Inner {
                keys: Mutex::new(keys),
                archive_suffix: archive_suffix.to_string(),
                store: Some((store, store_key.to_string())),
            }),
        }
    }

    /// Mark `key` as cleared.
    pub fn set(&self, key: &str) {
        let changed = self.inner.keys.lock().insert(key.to_string());
        if changed {
            debug!(key, "tombstone set");
            self.persist();
        }
    }

    /// Remove the marker. Returns whether one was present.
    pub fn lift(&self, key: &str) -> bool {
        let base = self.base_key(key);
        let removed = self.inner.keys.lock().remove(base);
        if removed {
            debug!(key = base, "tombstone lifted");
            self.persist();
        }
        removed
    }

    /// Undo a [`Self::lift`] made through `key` or its archive companion.
    pub fn restore(&self, key: &str) {
        self.set(self.base_key(key));
    }

    #[must_use]
    pub fn is_set(&self, key: &str) -> bool {
        self.inner.keys.lock().contains(key)
    }

    /// Whether reads of `key` must come back empty. Covers the archive
    /// companion of a tombstoned key.
    #[must_use]
    pub fn suppresses(&self, key: &str) -> bool {
        let keys = self.inner.keys.lock();
        keys.contains(key) || keys.contains(self.base_key(key))
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.keys.lock().iter().cloned().collect()
    }

    fn base_key<'a>(&self, key: &'a str) -> &'a str {
        key.strip_suffix(self.inner.archive_suffix.as_str())
            .filter(|base| !base.is_empty())
            .unwrap_or(key)
    }

    fn persist(&self) {
        let Some((store, store_key)) = &self.inner.store else {
            return;
        };
        let encoded = {
            let keys = self.inner.keys.lock();
            serde_json::to_string(&*keys)
        };
        let result = match encoded {
            Ok(text) => store.set(store_key, &text).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            warn!(tier = %store.tier(), error = %e, "failed to persist tombstones");
        }
    }
}
