//! Price provider trait definitions.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{PageRequest, PricePage};

use super::capabilities::RateLimit;

/// Trait for upstream mandi price providers.
///
/// A provider answers one page at a time. Walking pages, rate limiting and
/// timeouts are handled by [`crate::pagination`], so implementations only
/// translate a [`PageRequest`] into a network call and the response into rows.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use mandi_market_data::provider::{PriceProvider, RateLimit};
///
/// struct FixtureProvider;
///
/// #[async_trait]
/// impl PriceProvider for FixtureProvider {
///     fn id(&self) -> &'static str {
///         "FIXTURE"
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     async fn fetch_page(&self, request: &PageRequest) -> Result<PricePage, MarketDataError> {
///         Ok(PricePage::default())
///     }
/// }
/// ```
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Unique identifier for this provider, e.g. "DATA_GOV".
    ///
    /// Used for logging and rate limiter bucket keys.
    fn id(&self) -> &'static str;

    /// Rate limiting configuration applied before every page.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch one page of listings.
    ///
    /// Rows are returned with their state set to the requested state.
    /// `has_more` is false when fewer than `request.limit` rows came back.
    async fn fetch_page(&self, request: &PageRequest) -> Result<PricePage, MarketDataError>;
}
