//! Core error types for the mandi price service.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer,
//! and upstream provider errors are wrapped as [`Error::UpstreamUnavailable`].

use chrono::ParseError as ChronoParseError;
use thiserror::Error;

use mandi_market_data::{MarketDataError, RetryClass};

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for price operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Upstream provider unavailable: {0}")]
    UpstreamUnavailable(#[from] MarketDataError),

    #[error("Price store unavailable: {0}")]
    StoreUnavailable(#[from] DatabaseError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{failed} of {attempted} units failed")]
    PartialFailure { failed: usize, attempted: usize },

    #[error("Version conflict on {key}: expected {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: i32,
        actual: i32,
    },

    #[error("Cache not ready: {0}")]
    CacheNotReady(String),
}

impl Error {
    /// Whether a scheduled job should try the failed unit again.
    ///
    /// Only upstream errors carry a provider classification; a store outage is
    /// treated as transient, everything else as terminal.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Error::UpstreamUnavailable(e) => e.retry_class(),
            Error::StoreUnavailable(_) => RetryClass::WithBackoff,
            _ => RetryClass::Never,
        }
    }
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Validation errors for user input and data parsing.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Failed to parse date: {0}")]
    DateParse(#[from] ChronoParseError),
}

// === From implementations for common error types ===

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<ChronoParseError> for Error {
    fn from(err: ChronoParseError) -> Self {
        Error::Validation(ValidationError::DateParse(err))
    }
}
