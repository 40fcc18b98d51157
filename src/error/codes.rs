//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Tier errors
//! - 2xx: Write errors
//! - 3xx: Config errors
//! - 4xx: Data errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `TierUnavailable` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Tier errors (1xx)
    // ========================================
    /// E101: A storage tier failed its round-trip test or refused access
    TierUnavailable,
    /// E102: The tier has no primitive for the requested operation
    TierUnsupported,
    /// E103: The tier rejected a write because its quota is exhausted
    QuotaExceeded,
    /// E104: SQLite-backed tier reported an error
    DatabaseError,

    // ========================================
    // Write errors (2xx)
    // ========================================
    /// E201: Write was accepted but read-back did not match
    WriteVerificationFailed,
    /// E202: Write failed before verification could run
    WriteFailed,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file not found
    ConfigNotFound,
    /// E302: Config file has invalid syntax or values
    ConfigInvalid,

    // ========================================
    // Data errors (4xx)
    // ========================================
    /// E401: Stored text could not be decoded
    ParseError,
    /// E402: Key was used without the namespace prefix
    NamespaceViolation,
    /// E403: Snapshot file is malformed or from an unknown version
    SnapshotInvalid,
    /// E404: Value could not be serialized
    SerializationError,
    /// E405: Value does not have the shape registered for its key
    ShapeMismatch,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: Unexpected internal error
    InternalError,
    /// E902: Requested key or resource does not exist
    NotFound,
    /// E903: IO operation failed
    IoError,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `TierUnavailable` -> 101).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::TierUnavailable => 101,
            Self::TierUnsupported => 102,
            Self::QuotaExceeded => 103,
            Self::DatabaseError => 104,

            Self::WriteVerificationFailed => 201,
            Self::WriteFailed => 202,

            Self::ConfigNotFound => 301,
            Self::ConfigInvalid => 302,

            Self::ParseError => 401,
            Self::NamespaceViolation => 402,
            Self::SnapshotInvalid => 403,
            Self::SerializationError => 404,
            Self::ShapeMismatch => 405,

            Self::InternalError => 901,
            Self::NotFound => 902,
            Self::IoError => 903,
        }
    }

    /// Get the error code as a formatted string (e.g., "E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::TierUnavailable => "Run `tierkv probe` to see which tiers are reachable. Data falls back to the next available tier",
            Self::TierUnsupported => "This tier cannot perform the operation. Use `tierkv hard-clear <key>` to wipe a key on every tier",
            Self::QuotaExceeded => "Free space in the page tier or raise `tiers.page_quota_bytes`. Run `tierkv health` for a quota estimate",
            Self::DatabaseError => "Check that the extension database is not locked by another process. Run `tierkv health`",
            Self::WriteVerificationFailed => "The value did not persist. Export a backup with `tierkv export` and retry the save",
            Self::WriteFailed => "Check tier availability with `tierkv probe` and retry the save",
            Self::ConfigNotFound => "Create a config file or pass --config <path>",
            Self::ConfigInvalid => "Run `tierkv config` to see current values. Check TOML syntax in config file",
            Self::ParseError => "The stored text is not valid JSON. Run `tierkv scan <key>` to inspect every tier",
            Self::NamespaceViolation => "Prefix the key with the configured namespace (default `NS_`)",
            Self::SnapshotInvalid => "Re-export the snapshot with `tierkv export`. Only version 1 snapshots are accepted",
            Self::SerializationError => "The value could not be encoded as JSON. Check input data for validity",
            Self::ShapeMismatch => "Check the key's registered shape (list, map or scalar) with `tierkv config`",
            Self::InternalError => "An unexpected error occurred. Please report this issue with full error output",
            Self::NotFound => "The requested key was not found on any tier. Run `tierkv scan <key>` to confirm",
            Self::IoError => "File operation failed. Check the data directory exists and is writable",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::TierUnavailable
            | Self::TierUnsupported
            | Self::QuotaExceeded
            | Self::WriteVerificationFailed
            | Self::WriteFailed
            | Self::ConfigNotFound
            | Self::ConfigInvalid
            | Self::NamespaceViolation
            | Self::SnapshotInvalid
            | Self::ShapeMismatch
            | Self::NotFound
            | Self::IoError => true,

            Self::DatabaseError
            | Self::ParseError
            | Self::SerializationError
            | Self::InternalError => false,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "tier",
            2 => "write",
            3 => "config",
            4 => "data",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::TierUnavailable,
            Self::TierUnsupported,
            Self::QuotaExceeded,
            Self::DatabaseError,
            Self::WriteVerificationFailed,
            Self::WriteFailed,
            Self::ConfigNotFound,
            Self::ConfigInvalid,
            Self::ParseError,
            Self::NamespaceViolation,
            Self::SnapshotInvalid,
            Self::SerializationError,
            Self::ShapeMismatch,
            Self::InternalError,
            Self::NotFound,
            Self::IoError,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
