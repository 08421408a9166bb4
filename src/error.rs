//! Error types for kdb
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KdbError
pub type Result<T> = std::result::Result<T, KdbError>;

/// Unified error type for kdb operations
#[derive(Debug, Error)]
pub enum KdbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    #[error("WAL is closed")]
    WalClosed,

    #[error("WAL sequence numbers exhausted, checkpoint to restart at 1")]
    SequenceExhausted,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("B-tree invariant violated: {0}")]
    Invariant(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for KdbError {
    fn from(err: serde_json::Error) -> Self {
        KdbError::Serialization(err.to_string())
    }
}
