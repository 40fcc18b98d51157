//! Append-only log collections: fingerprinting, idempotent merge, archive
//! overflow and the live collection that lifts tombstones.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::key::LogicalKey;
use crate::tombstone::TombstoneRegistry;

/// One timestamped record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type", alias = "abilityType", default, deserialize_with = "lenient_text")]
    pub kind: String,
    #[serde(alias = "petName", default, deserialize_with = "lenient_text")]
    pub subject: String,
    /// Milliseconds since the epoch. `null` reads as 0, fractions are
    /// truncated.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Any other fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogEntry {
    #[must_use]
    pub fn new(kind: impl Into<String>, subject: impl Into<String>, timestamp: i64) -> Self {
        Self {
            kind: kind.into(),
            subject: subject.into(),
            timestamp,
            id: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Identity used for de-duplication: the explicit id, else the content
    /// fingerprint.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => fingerprint(&self.kind, &self.subject, self.timestamp),
        }
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|ms| ms as i64))
            .unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// 32-bit FNV-1a over the UTF-16 code units of `kind|subject|timestamp`,
/// rendered in base 36.
#[must_use]
pub fn fingerprint(kind: &str, subject: &str, timestamp: i64) -> String {
    let text = format!("{kind}|{subject}|{timestamp}");
    let mut hash: u32 = 2_166_136_261;
    for unit in text.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(16_777_619);
    }
    to_base36(hash)
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Result of [`merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// De-duplicated records, newest first.
    pub entries: Vec<LogEntry>,
    /// How many records of `incoming` were not already present.
    pub added: usize,
}

/// Merge `incoming` into `existing`.
///
/// Duplicates inside `existing` collapse too (first occurrence wins). The
/// result is stably sorted by timestamp, newest first, so merging the same
/// batch twice changes nothing.
#[must_use]
pub fn merge(existing: &[LogEntry], incoming: &[LogEntry]) -> MergeOutcome {
    let mut seen = HashSet::with_capacity(existing.len() + incoming.len());
    let mut entries = Vec::with_capacity(existing.len() + incoming.len());

    for entry in existing {
        if seen.insert(entry.dedup_key()) {
            entries.push(entry.clone());
        }
    }
    let mut added = 0;
    for entry in incoming {
        if seen.insert(entry.dedup_key()) {
            entries.push(entry.clone());
            added += 1;
        }
    }

    sort_newest_first(&mut entries);
    MergeOutcome { entries, added }
}

/// De-duplicate and sort a single batch.
#[must_use]
pub fn normalize(entries: &[LogEntry]) -> Vec<LogEntry> {
    merge(&[], entries).entries
}

fn sort_newest_first(entries: &mut [LogEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Split a newest-first list into the part kept under the main key and the
/// older overflow.
#[must_use]
pub fn split_overflow(mut entries: Vec<LogEntry>, max_in_main: usize) -> (Vec<LogEntry>, Vec<LogEntry>) {
    if entries.len() <= max_in_main {
        return (entries, Vec::new());
    }
    let overflow = entries.split_off(max_in_main);
    (entries, overflow)
}

/// Fold `overflow` into the archive, keeping at most `cap` newest records.
#[must_use]
pub fn archive_overflow(archive: &[LogEntry], overflow: &[LogEntry], cap: usize) -> Vec<LogEntry> {
    let mut merged = merge(archive, overflow).entries;
    merged.truncate(cap);
    merged
}

/// Decode a JSON list into records. Elements that are not records are
/// dropped with a warning.
#[must_use]
pub fn entries_from_json(value: &Value) -> Vec<LogEntry> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<LogEntry>(item.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping malformed log record");
                None
            }
        })
        .collect()
}

/// Strict variant of [`entries_from_json`] used before writing: any element
/// that is not a record is an error naming its index.
pub fn parse_entries(value: &Value) -> Result<Vec<LogEntry>, String> {
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<LogEntry>(item.clone())
                .map_err(|e| format!("log record {index} is not a record: {e}"))
        })
        .collect()
}

#[must_use]
pub fn entries_to_json(entries: &[LogEntry]) -> Value {
    serde_json::to_value(entries).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// A log collection being edited in place.
///
/// Every mutation goes through the de-duplication path. When a mutation adds
/// a record that was not already present to a tombstoned key, the collection
/// marks the tombstone for lifting; the engine lifts it when the commit is
/// verified. Records added here are stamped with their dedup id.
#[derive(Debug)]
pub struct LogCollection {
    key: LogicalKey,
    entries: Vec<LogEntry>,
    seen: HashSet<String>,
    tombstones: TombstoneRegistry,
    added: usize,
    lifted: bool,
}

impl LogCollection {
    #[must_use]
    pub fn new(key: LogicalKey, entries: &[LogEntry], tombstones: TombstoneRegistry) -> Self {
        let entries = normalize(entries);
        let seen = entries.iter().map(LogEntry::dedup_key).collect();
        Self {
            key,
            entries,
            seen,
            tombstones,
            added: 0,
            lifted: false,
        }
    }

    /// Append a record. Returns whether it was new.
    pub fn push(&mut self, entry: LogEntry) -> bool {
        let Some(entry) = self.admit(entry) else {
            return false;
        };
        self.entries.push(entry);
        self.finish(1);
        true
    }

    /// Prepend a record. Returns whether it was new.
    pub fn unshift(&mut self, entry: LogEntry) -> bool {
        let Some(entry) = self.admit(entry) else {
            return false;
        };
        self.entries.insert(0, entry);
        self.finish(1);
        true
    }

    /// Append many records. Returns how many were new.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = LogEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if let Some(entry) = self.admit(entry) {
                self.entries.push(entry);
                added += 1;
            }
        }
        self.finish(added);
        added
    }

    /// Remove `range` and insert `replacement` in its place. Returns the
    /// removed records. Replacement records already present elsewhere are
    /// dropped.
    pub fn splice(&mut self, range: Range<usize>, replacement: Vec<LogEntry>) -> Vec<LogEntry> {
        let end = range.end.min(self.entries.len());
        let start = range.start.min(end);
        let removed: Vec<LogEntry> = self.entries.drain(start..end).collect();
        for entry in &removed {
            self.seen.remove(&entry.dedup_key());
        }

        let mut inserted = Vec::new();
        for entry in replacement {
            if let Some(entry) = self.admit(entry) {
                inserted.push(entry);
            }
        }
        let added = inserted
            .iter()
            .filter(|entry| !removed.iter().any(|r| r.dedup_key() == entry.dedup_key()))
            .count();
        self.entries.splice(start..start, inserted);
        self.finish(added);
        removed
    }

    /// Replace the whole collection. Returns how many records were not in
    /// the previous contents.
    pub fn replace_all(&mut self, entries: &[LogEntry]) -> usize {
        let previous = std::mem::take(&mut self.seen);
        let normalized = normalize(entries);
        let added = normalized
            .iter()
            .filter(|entry| !previous.contains(&entry.dedup_key()))
            .count();
        self.seen = normalized.iter().map(LogEntry::dedup_key).collect();
        self.entries = normalized;
        self.finish(added);
        added
    }

    #[must_use]
    pub fn key(&self) -> &LogicalKey {
        &self.key
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records added since the collection was opened.
    #[must_use]
    pub const fn added(&self) -> usize {
        self.added
    }

    /// Whether committing this collection lifts the key's tombstone.
    #[must_use]
    pub const fn lifts_tombstone(&self) -> bool {
        self.lifted
    }

    fn admit(&mut self, mut entry: LogEntry) -> Option<LogEntry> {
        let id = entry.dedup_key();
        if !self.seen.insert(id.clone()) {
            return None;
        }
        entry.id = Some(id);
        Some(entry)
    }

    fn finish(&mut self, added: usize) {
        sort_newest_first(&mut self.entries);
        if added == 0 {
            return;
        }
        self.added += added;
        if !self.lifted && self.tombstones.suppresses(self.key.as_str()) {
            debug!(key = %self.key, "new record pending tombstone lift");
            self.lifted = true;
        }
    }
}
