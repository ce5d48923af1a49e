//! Error types for Steptally

use thiserror::Error;

/// Errors raised by the daily step store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Failed to create database directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid record date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Stored step count {0} is out of range")]
    InvalidCount(i64),
}

/// Errors that can occur while counting, persisting or replaying steps
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid running count file {path}: {reason}")]
    RunningCount { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid sample on line {line}: {reason}")]
    InvalidSample { line: usize, reason: String },

    #[error("Accelerometer is not available on this device")]
    SensorUnavailable,
}
