//! Convergence pass over the well-known key registry.
//!
//! For every registry key the replica loader elects a winner, and that
//! exact value is written to every reachable tier. The pass never re-scores
//! per tier and never touches keys without a usable candidate.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{TierId, TierSet};
use crate::key::LogicalKey;
use crate::loader::ReplicaLoader;

/// One key that was rewritten everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalizedKey {
    pub key: String,
    pub origin: TierId,
    pub score: i64,
    pub written: Vec<TierId>,
}

/// A tier that refused the canonical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileFailure {
    pub key: String,
    pub tier: TierId,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub canonicalized: Vec<CanonicalizedKey>,
    pub untouched: Vec<String>,
    pub errors: Vec<ReconcileFailure>,
    pub duration_ms: u64,
}

impl ReconcileReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Reconciler {
    tiers: TierSet,
    reachable: Vec<TierId>,
    loader: Arc<ReplicaLoader>,
    keys: Vec<LogicalKey>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        tiers: TierSet,
        reachable: Vec<TierId>,
        loader: Arc<ReplicaLoader>,
        keys: Vec<LogicalKey>,
    ) -> Self {
        Self {
            tiers,
            reachable,
            loader,
            keys,
        }
    }

    #[must_use]
    pub fn keys(&self) -> &[LogicalKey] {
        &self.keys
    }

    pub fn reconcile_all(&self) -> ReconcileReport {
        let started = Instant::now();
        let mut report = ReconcileReport::default();

        for key in &self.keys {
            let Some(winner) = self.loader.load_detailed(key) else {
                debug!(key = %key, "no usable replica, left untouched");
                report.untouched.push(key.to_string());
                continue;
            };

            let text = match serde_json::to_string(&winner.value) {
                Ok(text) => text,
                Err(e) => {
                    report.errors.push(ReconcileFailure {
                        key: key.to_string(),
                        tier: winner.origin,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let mut written = Vec::new();
            for tier in &self.reachable {
                let Some(backend) = self.tiers.get(*tier) else {
                    continue;
                };
                match backend.set(key.as_str(), &text) {
                    Ok(()) => written.push(*tier),
                    Err(e) => {
                        warn!(key = %key, %tier, error = %e, "canonical write failed");
                        report.errors.push(ReconcileFailure {
                            key: key.to_string(),
                            tier: *tier,
                            message: e.to_string(),
                        });
                    }
                }
            }

            info!(
                key = %key,
                origin = %winner.origin,
                score = winner.score,
                tiers = written.len(),
                "canonicalized"
            );
            report.canonicalized.push(CanonicalizedKey {
                key: key.to_string(),
                origin: winner.origin,
                score: winner.score,
                written,
            });
        }

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        report
    }
}
