//! Error types for gridkv.

use thiserror::Error;

/// Result type for gridkv operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors that can occur while reading or writing a table.
#[derive(Debug, Error)]
pub enum KvError {
    /// Key is not present in the table.
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// Table (sheet) is not present in the spreadsheet.
    #[error("Table not found: {name}")]
    TableNotFound { name: String },

    /// Creation was requested for a table that already exists.
    #[error("Table already exists: {name}")]
    AlreadyExists { name: String },

    /// Header row of an existing sheet does not match the expected header.
    #[error("Header mismatch: expected {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// More than one row claims the same key.
    #[error("Key {key} found in multiple rows: {rows:?}")]
    DuplicateKey { key: String, rows: Vec<usize> },

    /// Malformed range expression, empty key or similar caller mistake.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Structured value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure reported by the tabular backend or its transport.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Local I/O failure, e.g. reading a credentials file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KvError {
    /// Create an invalid argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Create a key-not-found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// True for both missing keys and missing tables.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. } | Self::TableNotFound { .. })
    }
}
