//! Error types for lorcana_store
//!
//! Absence of a collection, card or line item is never an error here; the
//! services report it through `Option`, `bool` or `LineItemOutcome`.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document or snapshot file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A file exists but does not hold valid JSON
    #[error("Corrupt JSON in {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// SQLite backend failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Input rejected before anything was written
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    /// Unknown export/import format requested
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Restore input is missing the backup marker or holds malformed documents
    #[error("Invalid backup file format: {0}")]
    InvalidBackupFormat(String),
}

/// Reasons an input payload is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{document} data must be {expected}, got {found}")]
    ShapeMismatch {
        document: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Duplicate id: {0}")]
    DuplicateId(String),
}

/// Coarse error classes exposed to callers (the HTTP layer maps these to status codes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    IoFailure,
    Validation,
    UnsupportedFormat,
    InvalidBackupFormat,
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Corrupt {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::Io { .. } | StoreError::Corrupt { .. } | StoreError::Database(_) => {
                ErrorCategory::IoFailure
            }
            StoreError::Validation(_) => ErrorCategory::Validation,
            StoreError::UnsupportedFormat(_) => ErrorCategory::UnsupportedFormat,
            StoreError::InvalidBackupFormat(_) => ErrorCategory::InvalidBackupFormat,
        }
    }
}

/// Name of a JSON value's kind, for shape mismatch messages
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Result alias for lorcana_store operations
pub type Result<T> = std::result::Result<T, StoreError>;
