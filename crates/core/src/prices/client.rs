//! Upstream Client - Facade for the market-data crate.
//!
//! This module provides a clean interface between the core domain layer
//! and the market-data crate's provider, pagination and rate limiting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Core Domain Layer                          │
//! │                                                                 │
//! │  (state, date) ──────────────────────────▶ CommodityPrice       │
//! │        │                                        ▲               │
//! │        ▼                                        │               │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                    UpstreamClient                         │  │
//! │  │                                                           │  │
//! │  │  PageFetcher ─▶ PriceProvider ─▶ RawPriceRow ─▶ convert   │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::debug;

use mandi_market_data::{PageFetcher, PaginationBudget, PriceProvider};

use super::model::CommodityPrice;
use super::types::DataSource;
use crate::errors::Result;

/// Upstream client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub budget: PaginationBudget,
}

/// Fetches complete (state, date) listings and converts them to records.
pub struct UpstreamClient {
    fetcher: PageFetcher,
}

impl UpstreamClient {
    pub fn new(provider: Arc<dyn PriceProvider>, config: ClientConfig) -> Self {
        Self {
            fetcher: PageFetcher::new(provider, config.budget),
        }
    }

    pub fn provider_id(&self) -> &'static str {
        self.fetcher.provider_id()
    }

    /// Fetch every page for a state and optional day.
    ///
    /// Records are stamped with `now` and the TTL of `source`. When `date` is
    /// `None` each record is keyed by its own arrival date.
    pub async fn fetch_day(
        &self,
        state: &str,
        date: Option<NaiveDate>,
        source: DataSource,
        now: DateTime<Utc>,
    ) -> Result<Vec<CommodityPrice>> {
        let page_set = self.fetcher.fetch_all(state, date).await?;
        let fetched = page_set.rows.len();

        let records: Vec<CommodityPrice> = page_set
            .rows
            .into_iter()
            .filter_map(|row| CommodityPrice::from_raw(row, date, source, now))
            .collect();

        let unordered = records.iter().filter(|r| !r.is_price_ordered()).count();
        if unordered > 0 {
            debug!(
                "{} of {} records for {} {:?} violate min <= modal <= max",
                unordered,
                records.len(),
                state,
                date
            );
        }
        debug!(
            "Upstream {} returned {} rows ({} usable) for {} {:?}{}",
            self.provider_id(),
            fetched,
            records.len(),
            state,
            date,
            if page_set.truncated { " [truncated]" } else { "" }
        );

        Ok(records)
    }
}
