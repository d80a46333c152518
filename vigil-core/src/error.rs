//! Error types for vigil-core

use thiserror::Error;

/// Main error type for the vigil-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Schema migration failed; the store must not be used
    #[error("migration error: {0}")]
    Migration(String),

    /// A stored row violated the schema contract (unexpected NULL, bad type)
    #[error("corrupt record in {table}: {message}")]
    CorruptRecord { table: String, message: String },

    /// Operation attempted after the store was closed
    #[error("telemetry store is closed")]
    StoreClosed,
}

/// Result type alias for vigil-core
pub type Result<T> = std::result::Result<T, Error>;
