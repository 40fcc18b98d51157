//! One-shot copy of registry keys from the primary page tier into the
//! extension tier, guarded by a completion flag.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::backend::Backend;
use crate::error::Result;
use crate::key::LogicalKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFailure {
    pub key: String,
    pub reason: String,
}

/// Summary persisted next to the completion flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStats {
    pub migrated_count: usize,
    pub total_bytes: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub already_completed: bool,
    pub migrated: Vec<String>,
    /// Keys the extension tier already held.
    pub kept: Vec<String>,
    pub failed: Vec<MigrationFailure>,
    pub total_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MigrationStats>,
}

pub struct Migrator {
    source: Arc<dyn Backend>,
    target: Arc<dyn Backend>,
    keys: Vec<LogicalKey>,
    flag_key: LogicalKey,
    stats_key: LogicalKey,
}

impl Migrator {
    #[must_use]
    pub fn new(
        source: Arc<dyn Backend>,
        target: Arc<dyn Backend>,
        keys: Vec<LogicalKey>,
        prefix: &str,
        flag: &str,
    ) -> Self {
        Self {
            source,
            target,
            keys,
            flag_key: LogicalKey::prefixed(flag, prefix),
            stats_key: LogicalKey::prefixed("migration_stats", prefix),
        }
    }

    /// Whether a previous run set the completion flag. Accepts both the
    /// JSON boolean and the quoted string form.
    pub fn is_completed(&self) -> Result<bool> {
        Ok(matches!(
            self.target.get(self.flag_key.as_str())?.as_deref().map(str::trim),
            Some("true" | "\"true\"")
        ))
    }

    /// Stats of the completed run, if any.
    pub fn status(&self) -> Result<Option<MigrationStats>> {
        Ok(self
            .target
            .get(self.stats_key.as_str())?
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    pub fn run(&self) -> Result<MigrationReport> {
        if self.is_completed()? {
            info!("migration already completed, skipping");
            return Ok(MigrationReport {
                already_completed: true,
                stats: self.status()?,
                ..MigrationReport::default()
            });
        }

        let mut report = MigrationReport::default();
        for key in &self.keys {
            match self.migrate_key(key) {
                Ok(Some(bytes)) => {
                    report.total_bytes += bytes;
                    report.migrated.push(key.to_string());
                }
                Ok(None) => report.kept.push(key.to_string()),
                Err(reason) => {
                    error!(key = %key, reason = %reason, "migration failed, page copy kept");
                    report.failed.push(MigrationFailure {
                        key: key.to_string(),
                        reason,
                    });
                }
            }
        }

        let stats = MigrationStats {
            migrated_count: report.migrated.len(),
            total_bytes: report.total_bytes,
            completed_at: Utc::now(),
        };
        self.target.set(self.flag_key.as_str(), "true")?;
        self.target
            .set(self.stats_key.as_str(), &serde_json::to_string(&stats)?)?;
        info!(
            migrated = stats.migrated_count,
            bytes = stats.total_bytes,
            failed = report.failed.len(),
            "migration completed"
        );
        report.stats = Some(stats);
        Ok(report)
    }

    /// `Some(bytes)` when the key was copied, `None` when there was nothing
    /// to copy or the target already held it.
    fn migrate_key(&self, key: &LogicalKey) -> std::result::Result<Option<usize>, String> {
        let raw = match self.source.get(key.as_str()).map_err(|e| e.to_string())? {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => {
                debug!(key = %key, "nothing to migrate");
                return Ok(None);
            }
        };
        if self
            .target
            .get(key.as_str())
            .map_err(|e| e.to_string())?
            .is_some_and(|existing| !existing.trim().is_empty())
        {
            debug!(key = %key, "extension tier already holds key");
            return Ok(None);
        }

        self.target
            .set(key.as_str(), &raw)
            .map_err(|e| e.to_string())?;
        let verified = self.target.get(key.as_str()).map_err(|e| e.to_string())?;
        if verified.as_deref() != Some(raw.as_str()) {
            return Err("verification failed".to_string());
        }
        self.source
            .remove(key.as_str())
            .map_err(|e| e.to_string())?;
        info!(key = %key, bytes = raw.len(), "migrated");
        Ok(Some(raw.len()))
    }
}
