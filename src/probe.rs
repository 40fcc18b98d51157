//! Backend selection by real round-trip testing.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{Backend, TierId, TierSet};

/// Outcome of probing one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierProbe {
    pub tier: TierId,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Which tier the engine writes to, and which tiers are reachable at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub selected: TierId,
    pub results: Vec<TierProbe>,
}

impl ProbeReport {
    #[must_use]
    pub fn is_available(&self, tier: TierId) -> bool {
        self.results
            .iter()
            .any(|probe| probe.tier == tier && probe.available)
    }

    /// Reachable tiers, highest priority first.
    #[must_use]
    pub fn available(&self) -> Vec<TierId> {
        self.results
            .iter()
            .filter(|probe| probe.available)
            .map(|probe| probe.tier)
            .collect()
    }
}

/// Probes each tier once and caches the verdict.
#[derive(Debug)]
pub struct BackendProbe {
    probe_key: String,
    report: OnceLock<ProbeReport>,
}

impl BackendProbe {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            probe_key: format!("__{prefix}probe__"),
            report: OnceLock::new(),
        }
    }

    /// Select the highest-priority tier that survives a write/read-back
    /// test. Falls back to the memory tier when none does. Idempotent: the
    /// first call's report is returned on every later call.
    pub fn select_tier(&self, tiers: &TierSet) -> &ProbeReport {
        self.report.get_or_init(|| self.run(tiers))
    }

    #[must_use]
    pub fn cached(&self) -> Option<&ProbeReport> {
        self.report.get()
    }

    fn run(&self, tiers: &TierSet) -> ProbeReport {
        let mut results = Vec::with_capacity(tiers.len());
        for backend in tiers.iter() {
            let tier = backend.tier();
            let outcome = self.round_trip(backend.as_ref());
            if let Err(reason) = &outcome {
                warn!(%tier, reason = %reason, "storage tier unavailable");
            } else {
                debug!(%tier, "storage tier passed round-trip");
            }
            results.push(TierProbe {
                tier,
                available: outcome.is_ok(),
                detail: outcome.err(),
            });
        }

        let selected = results
            .iter()
            .find(|probe| probe.available)
            .map_or(TierId::Memory, |probe| probe.tier);
        if !results.iter().any(|p| p.tier == TierId::Memory) {
            results.push(TierProbe {
                tier: TierId::Memory,
                available: true,
                detail: None,
            });
        }
        info!(%selected, "storage tier selected");
        ProbeReport { selected, results }
    }

    fn round_trip(&self, backend: &dyn Backend) -> Result<(), String> {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let value = format!("test_{nonce}_{}", uuid::Uuid::new_v4().simple());

        let result = backend
            .set(&self.probe_key, &value)
            .map_err(|e| e.to_string())
            .and_then(|()| backend.get(&self.probe_key).map_err(|e| e.to_string()))
            .and_then(|read| match read {
                Some(read) if read == value => Ok(()),
                Some(_) => Err("read-back mismatch".to_string()),
                None => Err("write did not persist".to_string()),
            });
        let _ = backend.remove(&self.probe_key);
        result
    }
}
