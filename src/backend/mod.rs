//! Storage tiers and the backend abstraction.
//!
//! Every tier exposes the same small string-to-string surface through
//! [`Backend`]. Values are always JSON text; decoding happens above this
//! layer so a backend never has to understand the data it stores.

mod file;
mod memory;
pub mod mock;
mod sqlite;
mod tombstone;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorCode;

pub use file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use mock::MockBackend;
pub use sqlite::SqliteBackend;
pub use tombstone::TombstoneAwareBackend;

/// Matches host error messages that signal an exhausted quota.
static QUOTA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)quota|exceeded").expect("quota pattern is valid"));

/// A storage facility, declared in priority order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierId {
    /// Extension-managed persistent store.
    ExtensionPersistent,
    /// Page-scoped store of the main frame.
    PagePrimary,
    /// Page-scoped store of an alternate frame.
    PageSecondary,
    /// Session-scoped store, lost when the session ends.
    Session,
    /// In-process map. Always available, never durable.
    Memory,
}

impl TierId {
    /// All tiers, highest priority first.
    pub const ALL: [Self; 5] = [
        Self::ExtensionPersistent,
        Self::PagePrimary,
        Self::PageSecondary,
        Self::Session,
        Self::Memory,
    ];

    /// Tiers that hold replicas of reconciled keys.
    pub const REPLICAS: [Self; 3] = [
        Self::ExtensionPersistent,
        Self::PagePrimary,
        Self::PageSecondary,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExtensionPersistent => "extension",
            Self::PagePrimary => "page-primary",
            Self::PageSecondary => "page-secondary",
            Self::Session => "session",
            Self::Memory => "memory",
        }
    }

    /// Lower number means higher priority.
    #[must_use]
    pub const fn priority(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn is_replica(self) -> bool {
        matches!(
            self,
            Self::ExtensionPersistent | Self::PagePrimary | Self::PageSecondary
        )
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tier '{s}'"))
    }
}

/// Failure reported by a single backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{tier} tier is unavailable: {reason}")]
    Unavailable { tier: TierId, reason: String },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("{tier} tier does not support {op}")]
    Unsupported { tier: TierId, op: &'static str },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

impl BackendError {
    /// Whether this failure should trigger the disposable-cache purge.
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_)) || QUOTA_PATTERN.is_match(&self.to_string())
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable { .. } => ErrorCode::TierUnavailable,
            Self::QuotaExceeded(_) => ErrorCode::QuotaExceeded,
            Self::Unsupported { .. } => ErrorCode::TierUnsupported,
            Self::Io(_) => ErrorCode::IoError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Corrupt(_) => ErrorCode::ParseError,
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Usage figures for a tier that can report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaEstimate {
    pub usage_bytes: u64,
    pub quota_bytes: Option<u64>,
}

impl QuotaEstimate {
    /// Percentage of the quota in use, when the quota is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_used(&self) -> Option<f64> {
        self.quota_bytes
            .filter(|quota| *quota > 0)
            .map(|quota| self.usage_bytes as f64 / quota as f64 * 100.0)
    }
}

/// A single storage tier.
///
/// Implementations must be safe to share across tasks; interior state goes
/// behind a lock.
pub trait Backend: Send + Sync {
    /// Which tier this backend models.
    fn tier(&self) -> TierId;

    /// Raw text stored under `key`, or `None` when absent.
    fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Store raw text under `key`.
    fn set(&self, key: &str, value: &str) -> BackendResult<()>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> BackendResult<()>;

    /// Delete every key. Tiers without a bulk primitive keep this default.
    fn clear(&self) -> BackendResult<()> {
        Err(BackendError::Unsupported {
            tier: self.tier(),
            op: "clear",
        })
    }

    /// Usage estimate, when the tier can provide one.
    fn estimate(&self) -> Option<QuotaEstimate> {
        None
    }
}

impl fmt::Debug for dyn Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Backend({})", self.tier())
    }
}

/// The configured tiers, kept sorted by priority.
#[derive(Clone, Default)]
pub struct TierSet {
    tiers: Vec<Arc<dyn Backend>>,
}

impl TierSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend, replacing any existing backend for the same tier.
    #[must_use]
    pub fn with(mut self, backend: Arc<dyn Backend>) -> Self {
        self.insert(backend);
        self
    }

    pub fn insert(&mut self, backend: Arc<dyn Backend>) {
        let tier = backend.tier();
        self.tiers.retain(|existing| existing.tier() != tier);
        self.tiers.push(backend);
        self.tiers.sort_by_key(|b| b.tier());
    }

    #[must_use]
    pub fn get(&self, tier: TierId) -> Option<&Arc<dyn Backend>> {
        self.tiers.iter().find(|b| b.tier() == tier)
    }

    #[must_use]
    pub fn contains(&self, tier: TierId) -> bool {
        self.get(tier).is_some()
    }

    /// Backends in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Backend>> {
        self.tiers.iter()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<TierId> {
        self.tiers.iter().map(|b| b.tier()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Apply `wrap` to every backend, keeping tier order.
    #[must_use]
    pub fn map(&self, wrap: impl Fn(Arc<dyn Backend>) -> Arc<dyn Backend>) -> Self {
        Self {
            tiers: self.tiers.iter().cloned().map(wrap).collect(),
        }
    }
}

impl fmt::Debug for TierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
