//! Error handling for tierkv.
//!
//! This module provides:
//! - [`StoreError`]: The main error enum for engine operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestions and context
//! - [`suggest_for_error`]: context-aware remediation text, also used by alerts

mod codes;
mod suggestions;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::backend::BackendError;

pub use codes::ErrorCode;
pub use suggestions::suggest_for_error;

/// Main error type for tierkv operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend unavailable: {tier}: {reason}")]
    BackendUnavailable { tier: String, reason: String },

    #[error("Write verification failed for {key} after {attempts} attempt(s)")]
    WriteVerificationFailed { key: String, attempts: u32 },

    #[error("Write failed for {key}: no tier accepted the value")]
    WriteFailed { key: String },

    #[error("Storage quota exceeded while writing {key}")]
    QuotaExceeded { key: String },

    #[error("Parse error for {key}: {reason}")]
    ParseError { key: String, reason: String },

    #[error("Key '{key}' is missing namespace prefix '{prefix}'")]
    NamespaceViolation { key: String, prefix: String },

    #[error("Shape mismatch for {key}: expected {expected}, found {found}")]
    ShapeMismatch {
        key: String,
        expected: String,
        found: String,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BackendUnavailable { .. } => ErrorCode::TierUnavailable,
            Self::WriteVerificationFailed { .. } => ErrorCode::WriteVerificationFailed,
            Self::WriteFailed { .. } => ErrorCode::WriteFailed,
            Self::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            Self::ParseError { .. } => ErrorCode::ParseError,
            Self::NamespaceViolation { .. } => ErrorCode::NamespaceViolation,
            Self::ShapeMismatch { .. } => ErrorCode::ShapeMismatch,
            Self::Backend(inner) => inner.code(),
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::Toml(_) | Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::ConfigNotFound(_) => ErrorCode::ConfigNotFound,
            Self::InvalidSnapshot(_) => ErrorCode::SnapshotInvalid,
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::BackendUnavailable { tier, reason } => {
                Some(serde_json::json!({ "tier": tier, "reason": reason }))
            }
            Self::WriteVerificationFailed { key, attempts } => {
                Some(serde_json::json!({ "key": key, "attempts": attempts }))
            }
            Self::QuotaExceeded { key } | Self::WriteFailed { key } => {
                Some(serde_json::json!({ "key": key }))
            }
            Self::ParseError { key, reason } => {
                Some(serde_json::json!({ "key": key, "reason": reason }))
            }
            Self::NamespaceViolation { key, prefix } => {
                Some(serde_json::json!({ "key": key, "prefix": prefix }))
            }
            Self::ShapeMismatch {
                key,
                expected,
                found,
            } => Some(serde_json::json!({ "key": key, "expected": expected, "found": found })),
            Self::NotFound(key) => Some(serde_json::json!({ "key": key })),
            _ => None,
        }
    }

    /// Whether this failure came from a storage quota.
    #[must_use]
    pub fn is_quota(&self) -> bool {
        match self {
            Self::QuotaExceeded { .. } => true,
            Self::Backend(inner) => inner.is_quota(),
            _ => false,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_store_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
///
/// Emitted in robot mode so scripts can branch on `code` rather than
/// parsing the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "QUOTA_EXCEEDED")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 103)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "tier", "write")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from a [`StoreError`].
    #[must_use]
    pub fn from_store_error(err: &StoreError) -> Self {
        let code = err.code();
        let context = err.context();
        let suggestion = suggest_for_error(code, context.as_ref());

        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion,
            context,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }

    /// Add context to this error and regenerate the suggestion.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self.suggestion = suggest_for_error(self.code, self.context.as_ref());
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&StoreError> for StructuredError {
    fn from(err: &StoreError) -> Self {
        Self::from_store_error(err)
    }
}

/// Result type alias using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
