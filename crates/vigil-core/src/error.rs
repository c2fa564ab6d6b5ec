//! Core error types for vigil-core.
//!
//! This module defines the error hierarchy using thiserror. The taxonomy
//! matters operationally: transient I/O failures (database, gateway) are
//! retried by callers, validation failures mark the offending row as skipped
//! for the tick, and nothing in this crate is allowed to take the process
//! down.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for vigil-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Notification gateway errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Row not found
    #[error("No {entity} row with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
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

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Notification gateway errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No provider endpoint configured for a channel
    #[error("No provider endpoint configured for channel '{channel}'")]
    ChannelNotConfigured { channel: String },

    /// The provider rejected the send
    #[error("Provider rejected send on '{channel}': {message}")]
    ProviderRejected { channel: String, message: String },

    /// Send did not complete within the per-channel timeout
    #[error("Send on '{channel}' timed out after {timeout_secs}s")]
    Timeout { channel: String, timeout_secs: u64 },

    /// Transport-level failure
    #[error("Transport error on '{channel}': {source}")]
    Transport {
        channel: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid local time string
    #[error("Invalid time_local '{0}': expected HH:MM")]
    InvalidTimeLocal(String),

    /// Invalid days-of-week set
    #[error("Invalid days_of_week: {0}")]
    InvalidDaysOfWeek(String),

    /// Invalid validity window
    #[error("Invalid validity window: end_date ({end}) precedes start_date ({start})")]
    InvalidValidityWindow {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Escalation steps out of order
    #[error("Escalation steps must have non-decreasing delay_min (step {index} has {delay_min}, previous {previous})")]
    StepsOutOfOrder {
        index: usize,
        delay_min: u32,
        previous: u32,
    },

    /// Disallowed state transition
    #[error("Illegal checkin transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
