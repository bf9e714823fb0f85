//! Error types for shardkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ShardError
pub type Result<T> = std::result::Result<T, ShardError>;

/// Unified error type for shardkv operations
#[derive(Debug, Error)]
pub enum ShardError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Durability Errors
    // -------------------------------------------------------------------------
    /// A WAL or snapshot line failed to parse during recovery.
    /// Logged and skipped by the caller, never fatal.
    #[error("malformed log line: {0}")]
    Malformed(String),

    #[error("store is shutting down")]
    ShuttingDown,

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("network error: {0}")]
    Network(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),
}

impl ShardError {
    /// Wrap a recorded WAL writer failure as an IO error.
    pub(crate) fn wal_write(message: &str) -> Self {
        ShardError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            message.to_string(),
        ))
    }
}
