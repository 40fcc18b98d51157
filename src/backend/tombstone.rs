//! Read-side tombstone enforcement.

use std::sync::Arc;

use super::{Backend, BackendResult, QuotaEstimate, TierId};
use crate::tombstone::TombstoneRegistry;

/// Text every tombstoned key reads as.
pub const EMPTY_LIST: &str = "[]";

/// Wraps a tier so that reads of tombstoned keys come back as an empty list,
/// whatever the tier physically holds. Writes pass straight through.
pub struct TombstoneAwareBackend {
    inner: Arc<dyn Backend>,
    registry: TombstoneRegistry,
}

impl TombstoneAwareBackend {
    #[must_use]
    pub fn new(inner: Arc<dyn Backend>, registry: TombstoneRegistry) -> Self {
        Self { inner, registry }
    }

    /// Wrap `inner` and erase the concrete type.
    #[must_use]
    pub fn wrap(inner: Arc<dyn Backend>, registry: &TombstoneRegistry) -> Arc<dyn Backend> {
        Arc::new(Self::new(inner, registry.clone()))
    }
}

impl Backend for TombstoneAwareBackend {
    fn tier(&self) -> TierId {
        self.inner.tier()
    }

    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        if self.registry.suppresses(key) {
            return Ok(Some(EMPTY_LIST.to_string()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        self.inner.remove(key)
    }

    fn clear(&self) -> BackendResult<()> {
        self.inner.clear()
    }

    fn estimate(&self) -> Option<QuotaEstimate> {
        self.inner.estimate()
    }
}
