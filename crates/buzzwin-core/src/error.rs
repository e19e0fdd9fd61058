//! Core error types for buzzwin-core.
//!
//! Each concern gets its own thiserror enum; `CoreError` aggregates them
//! so callers can use `?` across module boundaries.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for buzzwin-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Document store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Email transport errors
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Document store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Store migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Store is locked")]
    Locked,

    /// A referenced document does not exist
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// A stored document could not be decoded
    #[error("Corrupt {kind} document '{id}': {message}")]
    Corrupt {
        kind: &'static str,
        id: String,
        message: String,
    },

    /// A document could not be serialized
    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),

    /// The operation is not allowed for this document
    #[error("{0}")]
    Rejected(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),

    /// OS keyring access failed
    #[error("Keyring error: {0}")]
    Keyring(String),
}

/// Email transport errors.
#[derive(Error, Debug)]
pub enum EmailError {
    /// No relay endpoint configured
    #[error("Email relay endpoint not configured")]
    MissingEndpoint,

    /// The HTTP request itself failed
    #[error("Email transport failed: {0}")]
    Transport(String),

    /// The relay answered with a non-success status
    #[error("Email relay rejected message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The message failed validation before sending
    #[error("Invalid email request: {0}")]
    Invalid(#[from] ValidationError),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Time of day not in HH:MM form
    #[error("Invalid time of day '{0}': expected HH:MM")]
    InvalidClockTime(String),

    /// Recurrence rule breaks a shape invariant
    #[error("Invalid recurrence rule: {0}")]
    InvalidRecurrence(String),

    /// Email address does not look like one
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// A required field was empty
    #[error("Missing required field: {0}")]
    EmptyField(&'static str),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Store(err.into())
    }
}

impl From<reqwest::Error> for EmailError {
    fn from(err: reqwest::Error) -> Self {
        EmailError::Transport(err.to_string())
    }
}

impl From<keyring::Error> for ConfigError {
    fn from(err: keyring::Error) -> Self {
        ConfigError::Keyring(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
