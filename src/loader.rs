//! Best-of-N reads across replica tiers.
//!
//! Every replica tier is read independently, each candidate is decoded and
//! scored against the key's schema, and the largest non-empty candidate
//! wins. Ties go to the higher-priority tier. Loading never writes.
//!
//! Size is the only freshness signal: a larger but older replica beats a
//! smaller newer one. Reconcile passes narrow that window by rewriting the
//! winner everywhere.
//!
//! Candidates go through [`crate::schema::decode`], so a stored string whose
//! text is a JSON list or map comes back as that list or map.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::backend::{TierId, TierSet};
use crate::facade::KvFacade;
use crate::key::LogicalKey;
use crate::schema::{SchemaRegistry, ABSENT_SCORE};
use crate::tombstone::TombstoneRegistry;

/// The winning replica of one load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledValue {
    pub value: Value,
    pub origin: TierId,
    pub score: i64,
    /// Exact stored text of the winner.
    #[serde(skip)]
    pub raw: String,
}

/// Score of one tier's copy during a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateScore {
    pub tier: TierId,
    pub score: i64,
}

pub struct ReplicaLoader {
    tiers: TierSet,
    selected: TierId,
    facade: Arc<KvFacade>,
    schemas: Arc<SchemaRegistry>,
    tombstones: TombstoneRegistry,
}

impl ReplicaLoader {
    /// `tiers` must already enforce tombstones on reads.
    #[must_use]
    pub fn new(
        tiers: TierSet,
        selected: TierId,
        facade: Arc<KvFacade>,
        schemas: Arc<SchemaRegistry>,
        tombstones: TombstoneRegistry,
    ) -> Self {
        Self {
            tiers,
            selected,
            facade,
            schemas,
            tombstones,
        }
    }

    /// Tiers consulted for every load, highest priority first.
    #[must_use]
    pub fn sources(&self) -> Vec<TierId> {
        let mut sources: Vec<TierId> = TierId::REPLICAS
            .into_iter()
            .filter(|tier| self.tiers.contains(*tier))
            .collect();
        if !self.selected.is_replica() && self.tiers.contains(self.selected) {
            sources.push(self.selected);
        }
        sources
    }

    /// Best value for `key`, or `fallback` when no tier holds a usable one.
    #[must_use]
    pub fn load(&self, key: &LogicalKey, fallback: Value) -> Value {
        self.load_detailed(key).map_or(fallback, |winner| winner.value)
    }

    #[must_use]
    pub fn load_detailed(&self, key: &LogicalKey) -> Option<ReconciledValue> {
        self.load_with_scores(key).0
    }

    /// Winner plus the score every source produced.
    #[must_use]
    pub fn load_with_scores(&self, key: &LogicalKey) -> (Option<ReconciledValue>, Vec<CandidateScore>) {
        let schema = self.schemas.get(key.as_str());
        let mut best: Option<ReconciledValue> = None;
        let mut scores = Vec::new();

        let mut consider = |tier: TierId, raw: Option<String>| {
            let accepted = raw
                .as_deref()
                .and_then(|text| schema.accept(text).map(|value| (text, value)));
            let score = accepted.as_ref().map_or(ABSENT_SCORE, |(_, v)| v.score());
            scores.push(CandidateScore { tier, score });
            if let Some((text, value)) = accepted {
                if best.as_ref().is_none_or(|current| score > current.score) {
                    best = Some(ReconciledValue {
                        value: value.into_json(),
                        origin: tier,
                        score,
                        raw: text.to_string(),
                    });
                }
            }
        };

        for tier in self.sources() {
            let Some(backend) = self.tiers.get(tier) else {
                continue;
            };
            let raw = backend.get(key.as_str()).unwrap_or_else(|e| {
                debug!(%tier, key = %key, error = %e, "replica unreadable");
                None
            });
            consider(tier, raw);
        }
        if !self.tombstones.suppresses(key.as_str()) {
            if let Some(parked) = self.facade.shadowed(key.as_str()) {
                consider(TierId::Memory, Some(parked));
            }
        }

        let mut summary = String::new();
        for candidate in &scores {
            let _ = write!(summary, "{}={} ", candidate.tier, candidate.score);
        }
        debug!(
            key = %key,
            candidates = summary.trim_end(),
            winner = best.as_ref().map(|b| b.origin.as_str()).unwrap_or("none"),
            "replica load"
        );

        (best, scores)
    }
}
