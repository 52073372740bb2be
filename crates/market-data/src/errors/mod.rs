//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all upstream price operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching price listings from an upstream provider.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method. Callers on the live request path ignore the class and fail the unit of work;
/// scheduled jobs use it to decide whether to try again later.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider rate limited the request (HTTP 429 or quota exhausted).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// A page request, or the whole page set, did not finish in time.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider answered with a non-success status.
    #[error("Provider error: {provider} - HTTP {status}: {message}")]
    HttpStatus {
        /// The provider that returned the error
        provider: String,
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The provider answered 2xx but the payload could not be understood.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// The provider that returned the payload
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// The provider needs an API key and none is configured.
    #[error("Missing API key for provider: {0}")]
    MissingApiKey(String),

    /// Page request parameters were rejected before any network call.
    #[error("Invalid page request: {0}")]
    InvalidRequest(String),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use mandi_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "DATA_GOV".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::MissingApiKey("DATA_GOV".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_) => {
                RetryClass::WithBackoff
            }

            // Server-side failures may clear up; client errors won't.
            Self::HttpStatus { status, .. } if *status >= 500 => RetryClass::WithBackoff,
            Self::HttpStatus { .. } => RetryClass::Never,

            Self::InvalidResponse { .. } | Self::MissingApiKey(_) | Self::InvalidRequest(_) => {
                RetryClass::Never
            }
        }
    }
}
