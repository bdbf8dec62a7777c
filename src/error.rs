//! Error types for CinderKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using CinderError
pub type Result<T> = std::result::Result<T, CinderError>;

/// Unified error type for CinderKV operations
#[derive(Debug, Error)]
pub enum CinderError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Segment Errors
    // -------------------------------------------------------------------------
    /// A segment file name does not encode a sequence number
    #[error("Invalid segment file name: {0}")]
    InvalidFormat(String),

    /// Segment bytes that cannot be decoded as records
    #[error("Segment corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Value too large: {size} bytes (max {max})")]
    ValueTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
