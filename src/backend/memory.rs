//! In-process map tier.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{Backend, BackendResult, QuotaEstimate, TierId};

/// Volatile key-value map. Used as the unconditional fallback tier and,
/// with [`MemoryBackend::with_tier`], as a stand-in for any tier in tests.
#[derive(Debug)]
pub struct MemoryBackend {
    tier: TierId,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tier(TierId::Memory)
    }

    #[must_use]
    pub fn with_tier(tier: TierId) -> Self {
        Self {
            tier,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn tier(&self) -> TierId {
        self.tier
    }

    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> BackendResult<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn estimate(&self) -> Option<QuotaEstimate> {
        let usage = self
            .entries
            .lock()
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        Some(QuotaEstimate {
            usage_bytes: usage,
            quota_bytes: None,
        })
    }
}
