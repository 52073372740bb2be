//! Commodity price domain.
//!
//! - `model` / `types` - price records and their natural key
//! - `store` - storage trait implemented by the SQLite crate
//! - `client` - upstream fetches through the market-data crate
//! - `cache` - in-memory hot-state cache
//! - `service` - point, range, summary and revenue queries
//! - `backfill` / `sync` - bulk and scheduled ingestion

mod backfill;
mod cache;
mod client;
mod constants;
mod filter;
mod matching;
mod model;
mod responses;
mod service;
mod store;
mod sync;
mod types;
mod units;

#[cfg(test)]
mod test_support;

pub use backfill::{BackfillConfig, BackfillLoader, BackfillRequest, BackfillStats};
pub use cache::{
    CacheConfig, CacheStatus, DailyPriceCache, DateRange, LoadOutcome, LoadState,
    MarketComparison, StateCoverage,
};
pub use client::{ClientConfig, UpstreamClient};
pub use constants::*;
pub use filter::{refine, sort_by_commodity_market, sort_by_date_desc, PriceFilter};
pub use matching::{names_match, normalize_name};
pub use model::{CommodityPrice, PriceUpdate, PriceUpdateOutcome};
pub use responses::{
    BulkMarketDataResponse, CommoditySummary, FilteredMarketDataResponse, FiltersApplied,
    MarketDataResponse, MarketRecommendations, PriceAnalysis, PriceSummaryResponse,
    PriceUpdateResponse, QueryDateRange, QuerySource, RevenueAnalysis, RevenueResponse,
};
pub use service::{PriceQueryService, PriceQueryServiceTrait};
pub use store::PriceStore;
pub use sync::{LatestSync, SyncConfig, SyncReport, SyncStatus};
pub use types::{DataSource, NaturalKey};
pub use units::{per_kg_to_per_tonne, per_tonne_to_per_kg, round_display};
