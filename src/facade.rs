//! Single-tier key-value access with an in-process safety net.
//!
//! The facade talks to whichever tier the probe selected. A write that the
//! tier refuses is parked in a private memory shadow so the value stays
//! readable for the rest of the process; the next successful write to the
//! tier discards the parked copy.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::backend::{Backend, BackendError, BackendResult, MemoryBackend, TierId};

/// Where a facade write ended up.
#[derive(Debug)]
pub enum FacadeWrite {
    /// The selected tier accepted the write.
    Stored,
    /// The selected tier refused; the value lives in the memory shadow.
    Shadowed(BackendError),
}

pub struct KvFacade {
    selected: Arc<dyn Backend>,
    shadow: MemoryBackend,
}

impl std::fmt::Debug for KvFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvFacade")
            .field("selected", &self.selected.tier())
            .field("shadowed", &self.shadow.len())
            .finish()
    }
}

impl KvFacade {
    #[must_use]
    pub fn new(selected: Arc<dyn Backend>) -> Self {
        Self {
            selected,
            shadow: MemoryBackend::new(),
        }
    }

    #[must_use]
    pub fn selected_tier(&self) -> TierId {
        self.selected.tier()
    }

    /// Raw text for `key`. A parked write wins over the tier's copy.
    #[must_use]
    pub fn get_text(&self, key: &str) -> Option<String> {
        if let Ok(Some(parked)) = self.shadow.get(key) {
            return Some(parked);
        }
        match self.selected.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(tier = %self.selected.tier(), key, error = %e, "read failed");
                None
            }
        }
    }

    /// Decoded value for `key`, or `default` when absent. Text that is not
    /// JSON comes back as a string.
    #[must_use]
    pub fn get(&self, key: &str, default: Value) -> Value {
        match self.get_text(key) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            None => default,
        }
    }

    /// Store raw text, parking it in memory if the tier refuses.
    pub fn write_text(&self, key: &str, text: &str) -> BackendResult<FacadeWrite> {
        match self.selected.set(key, text) {
            Ok(()) => {
                self.shadow.remove(key)?;
                Ok(FacadeWrite::Stored)
            }
            Err(e) => {
                warn!(
                    tier = %self.selected.tier(),
                    key,
                    error = %e,
                    "write failed, value kept in memory only"
                );
                self.shadow.set(key, text)?;
                Ok(FacadeWrite::Shadowed(e))
            }
        }
    }

    /// Encode and store `value`. Returns `false` only if the value could not
    /// be kept anywhere.
    pub fn set(&self, key: &str, value: &Value) -> bool {
        let Ok(text) = serde_json::to_string(value) else {
            return false;
        };
        self.write_text(key, &text).is_ok()
    }

    pub fn remove(&self, key: &str) -> bool {
        let _ = self.shadow.remove(key);
        match self.selected.remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(tier = %self.selected.tier(), key, error = %e, "remove failed");
                false
            }
        }
    }

    /// Clear the selected tier. The extension tier has no bulk clear, so
    /// this is a logged no-op there.
    pub fn clear(&self) -> bool {
        let _ = self.shadow.clear();
        match self.selected.clear() {
            Ok(()) => true,
            Err(BackendError::Unsupported { tier, .. }) => {
                warn!(%tier, "clear not supported on this tier, nothing removed");
                false
            }
            Err(e) => {
                warn!(tier = %self.selected.tier(), error = %e, "clear failed");
                false
            }
        }
    }

    /// Raw text parked for `key`, if any.
    #[must_use]
    pub fn shadowed(&self, key: &str) -> Option<String> {
        self.shadow.get(key).ok().flatten()
    }

    pub(crate) fn forget_shadow(&self, key: &str) {
        let _ = self.shadow.remove(key);
    }
}
