//! Error types and handling for narrow core

use thiserror::Error;

/// Result type alias for narrow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for narrow core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Item source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Item store contract violations
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Pattern compilation errors outside of the silently-degrading search path
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid template '{name}': {message}")]
    InvalidTemplate { name: String, message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },
}

/// Item source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Provider not found: {name}")]
    NotFound { name: String },

    #[error("Provider '{provider}' requires {what}")]
    MissingContext { provider: String, what: String },

    #[error("Source failed: {message}")]
    Failed { message: String },
}

/// Item store contract violations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("Item store used after destroy")]
    Destroyed,

    #[error("Row {row} is out of range (rows: {len})")]
    RowOutOfRange { row: usize, len: usize },

    #[error("Row {row} is a prompt or header row and cannot be selected")]
    NotSelectable { row: usize },
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Generic(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Generic(msg.to_string())
    }
}
