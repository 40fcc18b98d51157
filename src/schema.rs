//! Typed stored values and the per-key schema registry.
//!
//! Each well-known key declares the shape its value must have. Scoring and
//! decoding consult the declaration instead of guessing from structure, so a
//! list that shows up where a map is expected is treated as absent rather
//! than competing on size.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::key::LogicalKey;

/// Score of a missing, unparseable, empty or wrongly shaped candidate.
pub const ABSENT_SCORE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    List,
    Map,
    Scalar,
    #[default]
    Any,
}

impl Shape {
    #[must_use]
    pub const fn accepts(self, other: Self) -> bool {
        matches!(self, Self::Any) || self as u8 == other as u8
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Map => "map",
            Self::Scalar => "scalar",
            Self::Any => "any",
        }
    }
}

/// A decoded, non-null stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    List(Vec<Value>),
    Map(Map<String, Value>),
    Scalar(Value),
}

impl StoredValue {
    /// `None` for JSON null.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(items) => Some(Self::List(items)),
            Value::Object(map) => Some(Self::Map(map)),
            other => Some(Self::Scalar(other)),
        }
    }

    #[must_use]
    pub const fn shape(&self) -> Shape {
        match self {
            Self::List(_) => Shape::List,
            Self::Map(_) => Shape::Map,
            Self::Scalar(_) => Shape::Scalar,
        }
    }

    /// Element count for collections, 1 for a scalar.
    #[must_use]
    pub fn score(&self) -> i64 {
        match self {
            Self::List(items) => i64::try_from(items.len()).unwrap_or(i64::MAX),
            Self::Map(map) => i64::try_from(map.len()).unwrap_or(i64::MAX),
            Self::Scalar(_) => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            Self::Scalar(_) => false,
        }
    }

    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::List(items) => Value::Array(items),
            Self::Map(map) => Value::Object(map),
            Self::Scalar(value) => value,
        }
    }
}

/// Parse stored text, unwrapping one level of double encoding.
///
/// Empty text and the literal markers `null` / `undefined` are absent. A
/// string whose content is itself a JSON list or map is taken as that list
/// or map; any other string stays a string.
///
/// This is lossy for text that happens to be JSON: saving the string
/// `"[1,2]"` loads back the list `[1, 2]`. Keys holding free text should be
/// declared `scalar` so a decoded list or map is rejected rather than
/// returned.
#[must_use]
pub fn decode(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
        return None;
    }
    let first: Value = serde_json::from_str(trimmed).ok()?;
    if let Value::String(inner) = &first {
        if let Ok(second @ (Value::Array(_) | Value::Object(_))) =
            serde_json::from_str::<Value>(inner)
        {
            return Some(second);
        }
    }
    match first {
        Value::Null => None,
        value => Some(value),
    }
}

/// Overflow limits of a log-shaped key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPolicy {
    pub archive_key: LogicalKey,
    pub max_in_main: usize,
    pub max_in_storage: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeySchema {
    pub shape: Shape,
    pub critical: bool,
    pub log: Option<LogPolicy>,
}

impl KeySchema {
    /// Decode `raw` into a candidate this key accepts. Wrong shape and
    /// empty collections come back as `None`.
    #[must_use]
    pub fn accept(&self, raw: &str) -> Option<StoredValue> {
        let value = StoredValue::from_json(decode(raw)?)?;
        if !self.shape.accepts(value.shape()) || value.is_empty() {
            return None;
        }
        Some(value)
    }

    /// Score of `raw` under this schema.
    #[must_use]
    pub fn score(&self, raw: &str) -> i64 {
        self.accept(raw).map_or(ABSENT_SCORE, |value| value.score())
    }
}

/// Schemas for every configured key, keyed by the prefixed name.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    prefix: String,
    archive_suffix: String,
    entries: HashMap<String, KeySchema>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let prefix = config.storage.namespace_prefix.clone();
        let mut entries: HashMap<String, KeySchema> = HashMap::new();

        for (short, shape) in &config.shapes {
            entries
                .entry(LogicalKey::prefixed(short, &prefix).as_str().to_string())
                .or_default()
                .shape = *shape;
        }
        for short in &config.write.critical_keys {
            entries
                .entry(LogicalKey::prefixed(short, &prefix).as_str().to_string())
                .or_default()
                .critical = true;
        }
        for short in &config.logs.keys {
            let key = LogicalKey::prefixed(short, &prefix);
            let archive = key.archive(&config.logs.archive_suffix);
            let entry = entries.entry(key.as_str().to_string()).or_default();
            entry.shape = Shape::List;
            entry.log = Some(LogPolicy {
                archive_key: archive.clone(),
                max_in_main: config.logs.max_in_main,
                max_in_storage: config.logs.max_in_storage,
            });
            entries
                .entry(archive.as_str().to_string())
                .or_default()
                .shape = Shape::List;
        }

        Self {
            prefix,
            archive_suffix: config.logs.archive_suffix.clone(),
            entries,
        }
    }

    /// Schema for `key`; unlisted keys accept any shape.
    #[must_use]
    pub fn get(&self, key: &str) -> KeySchema {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_critical(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|schema| schema.critical)
    }

    #[must_use]
    pub fn log_policy(&self, key: &str) -> Option<LogPolicy> {
        self.entries.get(key).and_then(|schema| schema.log.clone())
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn archive_suffix(&self) -> &str {
        &self.archive_suffix
    }
}
