//! Read-only location scans and the storage health check.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{Backend, TierId, TierSet};
use crate::key::LogicalKey;
use crate::tombstone::TombstoneRegistry;

/// Usage above this share of the quota is reported as an issue.
pub const QUOTA_WARNING_PERCENT: f64 = 80.0;

const PREVIEW_CHARS: usize = 200;

/// What one tier physically holds for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationScan {
    pub tier: TierId,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub corrupted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LocationScan {
    fn missing(tier: TierId) -> Self {
        Self {
            tier,
            found: false,
            item_count: None,
            data_type: None,
            preview: None,
            corrupted: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    /// Reads of this key are currently forced empty.
    pub tombstoned: bool,
    pub locations: Vec<LocationScan>,
}

impl ScanReport {
    /// Tiers that physically hold the key.
    #[must_use]
    pub fn found_in(&self) -> Vec<TierId> {
        self.locations
            .iter()
            .filter(|l| l.found)
            .map(|l| l.tier)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteTest {
    pub tier: TierId,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaCheck {
    pub tier: TierId,
    pub used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_used: Option<f64>,
    pub warning: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub selected: TierId,
    pub write_tests: Vec<WriteTest>,
    pub quota: Vec<QuotaCheck>,
    pub issues: Vec<String>,
}

impl HealthReport {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Diagnostics over the raw tiers, bypassing tombstones.
pub struct Diagnostics {
    tiers: TierSet,
    tombstones: TombstoneRegistry,
    selected: TierId,
    test_key: String,
}

impl Diagnostics {
    #[must_use]
    pub fn new(tiers: TierSet, tombstones: TombstoneRegistry, selected: TierId, prefix: &str) -> Self {
        Self {
            tiers,
            tombstones,
            selected,
            test_key: format!("{prefix}health_check_test"),
        }
    }

    /// Report where `key` physically lives. Never writes.
    #[must_use]
    pub fn scan_all_locations(&self, key: &LogicalKey) -> ScanReport {
        let locations = self
            .tiers
            .iter()
            .map(|backend| scan_one(backend.as_ref(), key))
            .collect();
        ScanReport {
            key: key.to_string(),
            timestamp: Utc::now(),
            tombstoned: self.tombstones.suppresses(key.as_str()),
            locations,
        }
    }

    /// Write-test every tier and collect quota estimates.
    #[must_use]
    pub fn health_check(&self) -> HealthReport {
        let mut issues = Vec::new();
        let mut write_tests = Vec::new();
        let mut quota = Vec::new();

        for backend in self.tiers.iter() {
            let tier = backend.tier();
            let outcome = self.write_test(backend.as_ref());
            if let Err(detail) = &outcome {
                issues.push(format!("{tier} write test failed: {detail}"));
            }
            write_tests.push(WriteTest {
                tier,
                passed: outcome.is_ok(),
                detail: outcome.err(),
            });

            if let Some(estimate) = backend.estimate() {
                let percent_used = estimate.percent_used();
                let warning = percent_used.is_some_and(|p| p > QUOTA_WARNING_PERCENT);
                if let Some(p) = percent_used.filter(|_| warning) {
                    warn!(%tier, percent_used = p, "storage nearly full");
                    issues.push(format!("{tier} storage {p:.2}% full - may cause save failures"));
                }
                quota.push(QuotaCheck {
                    tier,
                    used: estimate.usage_bytes,
                    quota: estimate.quota_bytes,
                    percent_used,
                    warning,
                });
            }
        }

        if self.selected == TierId::Memory {
            issues.push("no durable tier is available; data will not survive a restart".to_string());
        }

        HealthReport {
            timestamp: Utc::now(),
            selected: self.selected,
            write_tests,
            quota,
            issues,
        }
    }

    fn write_test(&self, backend: &dyn Backend) -> Result<(), String> {
        let value = serde_json::json!({ "test": true, "timestamp": Utc::now().timestamp_millis() })
            .to_string();
        let result = backend
            .set(&self.test_key, &value)
            .map_err(|e| e.to_string())
            .and_then(|()| backend.get(&self.test_key).map_err(|e| e.to_string()))
            .and_then(|read| match read {
                Some(read) if read == value => Ok(()),
                Some(_) => Err("read/write mismatch".to_string()),
                None => Err("value not retained".to_string()),
            });
        if let Err(e) = backend.remove(&self.test_key) {
            debug!(tier = %backend.tier(), error = %e, "health check cleanup failed");
        }
        result
    }
}

fn scan_one(backend: &dyn Backend, key: &LogicalKey) -> LocationScan {
    let tier = backend.tier();
    let raw = match backend.get(key.as_str()) {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return LocationScan::missing(tier),
        Err(e) => {
            return LocationScan {
                error: Some(e.to_string()),
                ..LocationScan::missing(tier)
            };
        }
    };
    let preview: String = raw.chars().take(PREVIEW_CHARS).collect();

    let Ok(first) = serde_json::from_str::<Value>(&raw) else {
        return LocationScan {
            found: true,
            corrupted: true,
            preview: Some(preview),
            ..LocationScan::missing(tier)
        };
    };
    let parsed = match first {
        Value::String(inner) => serde_json::from_str::<Value>(&inner).unwrap_or(Value::String(inner)),
        other => other,
    };

    let (item_count, data_type) = match &parsed {
        Value::Array(items) => (items.len(), "array"),
        Value::Object(map) => (map.len(), "object"),
        Value::String(_) => (0, "string"),
        Value::Number(_) => (0, "number"),
        Value::Bool(_) => (0, "boolean"),
        Value::Null => (0, "null"),
    };

    LocationScan {
        tier,
        found: true,
        item_count: Some(item_count),
        data_type: Some(data_type),
        preview: Some(preview),
        corrupted: false,
        error: None,
    }
}
