//! Mandi Market Data Crate
//!
//! Provider-agnostic fetching of daily mandi (wholesale market) price listings.
//!
//! # Overview
//!
//! - A [`PriceProvider`] trait answering one page of listings at a time
//! - The data.gov.in provider ([`DataGovProvider`])
//! - Token bucket rate limiting with minimum spacing ([`RateLimiter`])
//! - Bounded pagination with per-page and per-batch timeouts ([`PageFetcher`])
//! - Error classification for scheduled retries ([`RetryClass`])
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   PageFetcher    |  (cursor, budget, timeouts)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |   RateLimiter    |  (token bucket + spacing)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  PriceProvider   |  (data.gov.in, fixtures)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |   RawPriceRow    |  (per-tonne listing)
//! +------------------+
//! ```

pub mod errors;
pub mod models;
pub mod pagination;
pub mod provider;
pub mod rate_limiter;

pub use errors::{MarketDataError, RetryClass};
pub use models::{
    format_arrival_date, parse_arrival_date, PageRequest, PageSet, PricePage, RawPriceRow,
};
pub use pagination::{PageCursor, PageFetcher, PaginationBudget};
pub use provider::data_gov::{DataGovConfig, DataGovProvider, DEFAULT_BASE_URL, DEFAULT_RESOURCE_ID};
pub use provider::{PriceProvider, RateLimit};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
