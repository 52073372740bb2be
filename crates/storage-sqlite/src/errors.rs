//! Storage-specific error types for SQLite operations.
//!
//! This module provides error types that wrap Diesel-specific errors and convert
//! them to the database-agnostic error types defined in `mandi_core`.

use diesel::result::Error as DieselError;
use mandi_core::errors::{DatabaseError, Error};
use thiserror::Error;

/// Storage-specific errors that wrap Diesel and r2d2 types.
///
/// These errors are internal to the storage layer and are converted to
/// `mandi_core::Error` before being returned to callers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),

    /// A domain error raised inside a write job. Passed through untouched so
    /// `NotFound` and `Conflict` survive the transaction wrapper.
    #[error(transparent)]
    Core(Error),
}

impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::Core(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => {
                Error::StoreUnavailable(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::PoolError(e) => {
                Error::StoreUnavailable(DatabaseError::PoolCreationFailed(e.to_string()))
            }
            StorageError::QueryFailed(DieselError::NotFound) => {
                Error::NotFound("Record not found".to_string())
            }
            StorageError::QueryFailed(DieselError::RollbackTransaction) => {
                Error::StoreUnavailable(DatabaseError::TransactionFailed(
                    "transaction rolled back".to_string(),
                ))
            }
            StorageError::QueryFailed(e) => {
                Error::StoreUnavailable(DatabaseError::QueryFailed(e.to_string()))
            }
            StorageError::MigrationFailed(e) => {
                Error::StoreUnavailable(DatabaseError::MigrationFailed(e))
            }
            StorageError::Decode(e) => Error::StoreUnavailable(DatabaseError::Internal(e)),
            StorageError::Core(e) => e,
        }
    }
}

/// Extension trait for easily converting Diesel Results to core Results.
///
/// This provides a `.into_core()` method on any `Result<T, diesel::result::Error>`
/// which handles the conversion through StorageError.
pub trait IntoCore<T> {
    fn into_core(self) -> mandi_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self) -> mandi_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, r2d2::Error> {
    fn into_core(self) -> mandi_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, diesel::ConnectionError> {
    fn into_core(self) -> mandi_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_pass_through() {
        let conflict = Error::Conflict {
            key: "Karnataka_2025-01-15_Kolar_Tomato".to_string(),
            expected: 1,
            actual: 2,
        };
        let roundtrip: Error = StorageError::from(conflict).into();
        assert!(matches!(roundtrip, Error::Conflict { actual: 2, .. }));
    }

    #[test]
    fn test_query_failures_are_store_unavailable() {
        let result: std::result::Result<(), DieselError> =
            Err(DieselError::QueryBuilderError("bad".into()));
        assert!(matches!(
            result.into_core(),
            Err(Error::StoreUnavailable(DatabaseError::QueryFailed(_)))
        ));
    }
}
