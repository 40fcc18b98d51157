//! JSON snapshots of the registry keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub prefix: String,
    /// Best value of every key that had one, keyed by the prefixed name.
    pub entries: BTreeMap<String, Value>,
}

impl Snapshot {
    #[must_use]
    pub fn new(prefix: &str, entries: BTreeMap<String, Value>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            prefix: prefix.to_string(),
            entries,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StoreError::InvalidSnapshot(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.prefix.is_empty() {
            return Err(StoreError::InvalidSnapshot("empty namespace prefix".to_string()));
        }
        if let Some(key) = self.entries.keys().find(|k| !k.starts_with(&self.prefix)) {
            return Err(StoreError::NamespaceViolation {
                key: key.clone(),
                prefix: self.prefix.clone(),
            });
        }
        Ok(())
    }

    pub fn parse(text: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(text)
            .map_err(|e| StoreError::InvalidSnapshot(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of restoring a snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub restored: Vec<String>,
    pub failed: Vec<String>,
}
