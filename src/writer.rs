//! Write-with-verification.
//!
//! A save encodes the value once, writes it, reads it back and compares the
//! text. Mismatches and tier errors are retried with a fixed delay. A quota
//! error purges the disposable caches and gets exactly one immediate retry,
//! whose outcome is final. Only critical keys raise a user-visible alert
//! when every attempt fails.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendError, TierId, TierSet};
use crate::config::Config;
use crate::error::{suggest_for_error, ErrorCode, Result, StoreError};
use crate::facade::{FacadeWrite, KvFacade};
use crate::key::LogicalKey;
use crate::logs::{normalize, parse_entries, split_overflow, LogEntry};
use crate::schema::{SchemaRegistry, StoredValue};

/// Retry and purge settings.
#[derive(Debug, Clone)]
pub struct WritePolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Raw key names dropped from every tier on a quota error.
    pub disposable_keys: Vec<String>,
}

impl WritePolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.write.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.write.retry_delay_ms),
            disposable_keys: config.write.disposable_keys.clone(),
        }
    }
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Message shown to the user when a critical key could not be saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalAlert {
    pub key: String,
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: String,
}

/// Receives critical-key alerts.
pub trait AlertSink: Send + Sync {
    fn alert(&self, alert: &CriticalAlert);
}

/// Default sink: the alert becomes an error-level log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, alert: &CriticalAlert) {
        error!(
            key = %alert.key,
            code = %alert.code,
            suggestion = %alert.suggestion,
            "{}",
            alert.message
        );
    }
}

/// Which route a save took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePath {
    /// Extension tier, mirrored to the primary page tier.
    Primary,
    /// Through the facade onto whichever tier the probe selected.
    Fallback,
}

/// Successful save.
#[derive(Debug, Clone, Serialize)]
pub struct WriteReceipt {
    pub key: String,
    pub path: WritePath,
    pub attempts: u32,
    pub mirrored: bool,
    pub quota_recovered: bool,
    pub bytes: usize,
    /// Log records that did not fit under the main key.
    #[serde(skip)]
    pub overflow: Vec<LogEntry>,
}

/// Encoded value ready to write.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedWrite {
    pub text: String,
    pub overflow: Vec<LogEntry>,
}

#[derive(Debug)]
enum AttemptError {
    Backend(BackendError),
    Mismatch,
}

impl AttemptError {
    fn is_quota(&self) -> bool {
        matches!(self, Self::Backend(e) if e.is_quota())
    }
}

impl From<BackendError> for AttemptError {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

pub struct VerifiedWriter {
    tiers: TierSet,
    selected: TierId,
    facade: Arc<KvFacade>,
    schemas: Arc<SchemaRegistry>,
    policy: WritePolicy,
    alerts: Arc<dyn AlertSink>,
}

impl VerifiedWriter {
    #[must_use]
    pub fn new(
        tiers: TierSet,
        selected: TierId,
        facade: Arc<KvFacade>,
        schemas: Arc<SchemaRegistry>,
        policy: WritePolicy,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            tiers,
            selected,
            facade,
            schemas,
            policy,
            alerts,
        }
    }

    #[must_use]
    pub fn path(&self) -> WritePath {
        if self.selected == TierId::ExtensionPersistent && self.tiers.contains(self.selected) {
            WritePath::Primary
        } else {
            WritePath::Fallback
        }
    }

    /// Pre-save hook shared by both write paths: shape check, then for log
    /// keys de-duplication, newest-first ordering and the overflow split.
    pub fn prepare(&self, key: &LogicalKey, value: &Value) -> Result<PreparedWrite> {
        let schema = self.schemas.get(key.as_str());
        if let Some(stored) = StoredValue::from_json(value.clone()) {
            if !schema.shape.accepts(stored.shape()) {
                return Err(StoreError::ShapeMismatch {
                    key: key.to_string(),
                    expected: schema.shape.as_str().to_string(),
                    found: stored.shape().as_str().to_string(),
                });
            }
        }

        if let Some(policy) = schema.log {
            let records = parse_entries(value).map_err(|reason| StoreError::ParseError {
                key: key.to_string(),
                reason,
            })?;
            let entries = normalize(&records);
            let (main, overflow) = split_overflow(entries, policy.max_in_main);
            if !overflow.is_empty() {
                debug!(key = %key, overflow = overflow.len(), "log overflow split off");
            }
            return Ok(PreparedWrite {
                text: serde_json::to_string(&main)?,
                overflow,
            });
        }

        Ok(PreparedWrite {
            text: serde_json::to_string(value)?,
            overflow: Vec::new(),
        })
    }

    /// Save `value` under `key`, verifying the write.
    pub async fn save(&self, key: &LogicalKey, value: &Value) -> Result<WriteReceipt> {
        let prepared = self.prepare(key, value)?;
        self.save_prepared(key, prepared).await
    }

    /// Save text that already went through [`Self::prepare`].
    pub async fn save_prepared(&self, key: &LogicalKey, prepared: PreparedWrite) -> Result<WriteReceipt> {
        let path = self.path();
        let critical = self.schemas.is_critical(key.as_str());
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            if critical {
                info!(key = %key, attempt, max = self.policy.max_attempts, "saving critical key");
            }

            let err = match self.attempt(path, key, &prepared.text) {
                Ok(mirrored) => {
                    return Ok(self.receipt(key, path, attempt, mirrored, false, prepared));
                }
                Err(err) => err,
            };

            if err.is_quota() {
                warn!(key = %key, "quota exceeded, purging disposable caches and retrying once");
                self.purge_disposable();
                attempt += 1;
                return match self.attempt(path, key, &prepared.text) {
                    Ok(mirrored) => Ok(self.receipt(key, path, attempt, mirrored, true, prepared)),
                    Err(retry_err) => Err(self.give_up(key, attempt, retry_err)),
                };
            }

            if attempt >= self.policy.max_attempts {
                return Err(self.give_up(key, attempt, err));
            }
            debug!(key = %key, attempt, error = ?err, "save not verified, retrying");
            tokio::time::sleep(self.policy.retry_delay).await;
        }
    }

    fn attempt(&self, path: WritePath, key: &LogicalKey, text: &str) -> std::result::Result<bool, AttemptError> {
        match path {
            WritePath::Primary => self.attempt_primary(key, text),
            WritePath::Fallback => self.attempt_fallback(key, text),
        }
    }

    fn attempt_primary(&self, key: &LogicalKey, text: &str) -> std::result::Result<bool, AttemptError> {
        let Some(primary) = self.tiers.get(TierId::ExtensionPersistent) else {
            return Err(AttemptError::Backend(BackendError::Unavailable {
                tier: TierId::ExtensionPersistent,
                reason: "not configured".to_string(),
            }));
        };
        primary.set(key.as_str(), text)?;

        let mirrored = self.tiers.get(TierId::PagePrimary).is_some_and(|page| {
            page.set(key.as_str(), text)
                .inspect_err(|e| warn!(key = %key, error = %e, "page mirror failed (non-fatal)"))
                .is_ok()
        });

        match primary.get(key.as_str())? {
            Some(read) if read == text => {
                self.facade.forget_shadow(key.as_str());
                Ok(mirrored)
            }
            _ => Err(AttemptError::Mismatch),
        }
    }

    fn attempt_fallback(&self, key: &LogicalKey, text: &str) -> std::result::Result<bool, AttemptError> {
        match self.facade.write_text(key.as_str(), text)? {
            FacadeWrite::Stored => {}
            FacadeWrite::Shadowed(e) => return Err(AttemptError::Backend(e)),
        }
        match self.facade.get_text(key.as_str()) {
            Some(read) if read == text => Ok(false),
            _ => Err(AttemptError::Mismatch),
        }
    }

    fn purge_disposable(&self) {
        for backend in self.tiers.iter() {
            for key in &self.policy.disposable_keys {
                if let Err(e) = backend.remove(key) {
                    debug!(tier = %backend.tier(), key, error = %e, "purge skipped");
                }
            }
        }
    }

    fn receipt(
        &self,
        key: &LogicalKey,
        path: WritePath,
        attempts: u32,
        mirrored: bool,
        quota_recovered: bool,
        prepared: PreparedWrite,
    ) -> WriteReceipt {
        if self.schemas.is_critical(key.as_str()) {
            info!(key = %key, attempts, "critical key saved and verified");
        } else {
            debug!(key = %key, attempts, "saved and verified");
        }
        WriteReceipt {
            key: key.to_string(),
            path,
            attempts,
            mirrored,
            quota_recovered,
            bytes: prepared.text.len(),
            overflow: prepared.overflow,
        }
    }

    fn give_up(&self, key: &LogicalKey, attempts: u32, cause: AttemptError) -> StoreError {
        let err = match cause {
            AttemptError::Mismatch => StoreError::WriteVerificationFailed {
                key: key.to_string(),
                attempts,
            },
            AttemptError::Backend(e) if e.is_quota() => StoreError::QuotaExceeded {
                key: key.to_string(),
            },
            AttemptError::Backend(e) => StoreError::Backend(e),
        };
        error!(key = %key, attempts, error = %err, "save failed");

        if self.schemas.is_critical(key.as_str()) {
            let short = key.short(self.schemas.prefix());
            let context = serde_json::json!({ "key": key.as_str(), "attempts": attempts });
            self.alerts.alert(&CriticalAlert {
                key: key.to_string(),
                code: err.code(),
                message: format!("Failed to save {short}! Your changes may not persist."),
                suggestion: suggest_for_error(err.code(), Some(&context)),
            });
        }
        err
    }
}
