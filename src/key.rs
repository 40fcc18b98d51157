//! Namespaced storage keys.

use std::backtrace::Backtrace;
use std::fmt;

use tracing::warn;

/// A storage key that is guaranteed to carry the namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalKey(String);

impl LogicalKey {
    /// Accept `raw` as-is when it carries `prefix`, otherwise prepend it.
    ///
    /// A missing prefix is a caller bug, so the correction is logged with
    /// the call site's backtrace (captured when `RUST_BACKTRACE` is set).
    #[must_use]
    pub fn enforce(raw: &str, prefix: &str) -> Self {
        if raw.starts_with(prefix) {
            return Self(raw.to_string());
        }
        let corrected = format!("{prefix}{raw}");
        let trace = Backtrace::capture();
        warn!(
            key = raw,
            corrected = %corrected,
            backtrace = %trace,
            "namespace prefix missing, auto-corrected"
        );
        Self(corrected)
    }

    /// Prefix `raw` without logging. For keys that are listed unprefixed on
    /// purpose, such as config registries.
    #[must_use]
    pub fn prefixed(raw: &str, prefix: &str) -> Self {
        if raw.starts_with(prefix) {
            Self(raw.to_string())
        } else {
            Self(format!("{prefix}{raw}"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key with `prefix` stripped.
    #[must_use]
    pub fn short<'a>(&'a self, prefix: &str) -> &'a str {
        self.0.strip_prefix(prefix).unwrap_or(&self.0)
    }

    /// Overflow companion of this key.
    #[must_use]
    pub fn archive(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
