//! Price query service.
//!
//! Answers point, range, summary, revenue and bulk queries by combining the
//! in-memory cache, the durable store and the upstream client:
//!
//! ```text
//! dated point query:   cache ──miss──▶ store ──miss──▶ upstream ──▶ persist (live TTL)
//! undated point query: store.get_recent ──empty──▶ upstream (latest) ──▶ persist
//! ```
//!
//! Component failures are reported in-band on the response. Only invalid input,
//! version conflicts and store outages during a mutation surface as `Err`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;

use super::cache::{CacheStatus, DailyPriceCache, LoadOutcome, MarketComparison};
use super::client::UpstreamClient;
use super::constants::{DEFAULT_FILTER_WINDOW_DAYS, MAX_QUERY_LIMIT};
use super::filter::{sort_by_commodity_market, sort_by_date_desc, PriceFilter};
use super::matching::names_match;
use super::model::{CommodityPrice, PriceUpdate};
use super::responses::{
    BulkMarketDataResponse, CommoditySummary, FilteredMarketDataResponse, FiltersApplied,
    MarketDataResponse, MarketRecommendations, PriceAnalysis, PriceSummaryResponse,
    PriceUpdateResponse, QueryDateRange, QuerySource, RevenueAnalysis, RevenueResponse,
};
use super::store::PriceStore;
use super::types::DataSource;
use super::units::{per_tonne_to_per_kg, round_display};
use crate::errors::{Error, Result, ValidationError};

const NO_RECENT_DATA: &str = "No recent data available from any source";

/// Query operations over commodity prices.
#[async_trait]
pub trait PriceQueryServiceTrait: Send + Sync {
    // =========================================================================
    // Point and Range Queries
    // =========================================================================

    /// Listings for one state, for a given day or the latest available.
    async fn get_market_data(
        &self,
        state: &str,
        date: Option<NaiveDate>,
        limit: usize,
        offset: usize,
    ) -> Result<MarketDataResponse>;

    /// Range query with commodity and market refinement.
    ///
    /// Missing `end_date` is today; missing `start_date` is 60 days before the end.
    fn get_filtered_market_data(&self, filter: &PriceFilter) -> Result<FilteredMarketDataResponse>;

    /// Point query per state; a failing state contributes an empty list.
    async fn get_bulk_market_data(
        &self,
        date: Option<NaiveDate>,
        states: Option<Vec<String>>,
        limit: usize,
        offset: usize,
    ) -> Result<BulkMarketDataResponse>;

    // =========================================================================
    // Analytics
    // =========================================================================

    /// Per-commodity statistics over the latest dataset, per kg.
    async fn get_price_summary(
        &self,
        state: &str,
        commodity: Option<&str>,
    ) -> Result<PriceSummaryResponse>;

    /// Revenue range for selling `quantity_kg` of a commodity.
    async fn calculate_revenue(
        &self,
        state: &str,
        commodity: &str,
        quantity_kg: Decimal,
    ) -> Result<RevenueResponse>;

    fn commodity_trend(
        &self,
        state: &str,
        commodity: &str,
        days_back: u32,
    ) -> Result<Vec<CommodityPrice>>;

    fn market_comparison(
        &self,
        state: &str,
        commodity: &str,
        markets: Option<&[String]>,
    ) -> Result<Vec<MarketComparison>>;

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Overwrites a stored modal price. An absent key is `success: false`.
    async fn update_price(&self, update: &PriceUpdate) -> Result<PriceUpdateResponse>;

    // =========================================================================
    // Cache
    // =========================================================================

    fn cache_status(&self) -> CacheStatus;

    async fn refresh_cache(&self) -> LoadOutcome;
}

pub struct PriceQueryService {
    store: Arc<dyn PriceStore>,
    client: Arc<UpstreamClient>,
    cache: Arc<DailyPriceCache>,
}

impl PriceQueryService {
    pub fn new(
        store: Arc<dyn PriceStore>,
        client: Arc<UpstreamClient>,
        cache: Arc<DailyPriceCache>,
    ) -> Self {
        Self {
            store,
            client,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<DailyPriceCache> {
        &self.cache
    }

    fn validate_point_query(state: &str, limit: usize) -> Result<()> {
        if state.trim().is_empty() {
            return Err(ValidationError::MissingField("state".to_string()).into());
        }
        if limit == 0 || limit > MAX_QUERY_LIMIT {
            return Err(ValidationError::InvalidInput(format!(
                "limit must be between 1 and {}, got {}",
                MAX_QUERY_LIMIT, limit
            ))
            .into());
        }
        Ok(())
    }

    fn page(records: Vec<CommodityPrice>, limit: usize, offset: usize) -> Vec<CommodityPrice> {
        records.into_iter().skip(offset).take(limit).collect()
    }

    /// Writes freshly fetched records. A failed write is logged; the caller
    /// still serves the data it fetched.
    async fn persist(&self, state: &str, records: &[CommodityPrice]) {
        match self.store.batch_write(records).await {
            Ok(written) => debug!("Persisted {} upstream records for {}", written, state),
            Err(e) => error!("Failed to persist upstream records for {}: {}", state, e),
        }
    }

    async fn dated_query(
        &self,
        state: &str,
        date: NaiveDate,
        limit: usize,
        offset: usize,
    ) -> MarketDataResponse {
        if self.cache.is_loaded() {
            if let Ok(Some(mut records)) = self.cache.get_day(state, date) {
                sort_by_commodity_market(&mut records);
                return MarketDataResponse::found(
                    state,
                    Some(date),
                    QuerySource::Cache,
                    Self::page(records, limit, offset),
                );
            }
        }

        match self.store.get(state, date, limit, offset) {
            Ok(records) if !records.is_empty() => {
                return MarketDataResponse::found(state, Some(date), QuerySource::Store, records);
            }
            Ok(_) if offset > 0 => {
                // Past the end of a stored day: do not refetch it.
                match self.store.has_data(state, date) {
                    Ok(true) => {
                        return MarketDataResponse::found(
                            state,
                            Some(date),
                            QuerySource::Store,
                            Vec::new(),
                        );
                    }
                    Ok(false) => {}
                    Err(e) => {
                        return MarketDataResponse::failed(
                            state,
                            Some(date),
                            QuerySource::Error,
                            e.to_string(),
                        );
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("Store read failed for {} {}: {}", state, date, e);
                return MarketDataResponse::failed(
                    state,
                    Some(date),
                    QuerySource::Error,
                    e.to_string(),
                );
            }
        }

        match self
            .client
            .fetch_day(state, Some(date), DataSource::Live, Utc::now())
            .await
        {
            Ok(records) if records.is_empty() => {
                debug!("No upstream listings for {} {}", state, date);
                MarketDataResponse::found(state, Some(date), QuerySource::None, Vec::new())
            }
            Ok(mut records) => {
                self.persist(state, &records).await;
                sort_by_commodity_market(&mut records);
                MarketDataResponse::found(
                    state,
                    Some(date),
                    QuerySource::Upstream,
                    Self::page(records, limit, offset),
                )
            }
            Err(e) => {
                warn!("Upstream fetch failed for {} {}: {}", state, date, e);
                MarketDataResponse::failed(state, Some(date), QuerySource::Error, e.to_string())
            }
        }
    }

    async fn latest_query(&self, state: &str, limit: usize, offset: usize) -> MarketDataResponse {
        match self.store.get_recent(state, limit, offset) {
            Ok(records) if !records.is_empty() => {
                return MarketDataResponse::found(state, None, QuerySource::Store, records);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Store read failed for {} (latest): {}", state, e);
                return MarketDataResponse::failed(state, None, QuerySource::Error, e.to_string());
            }
        }

        match self
            .client
            .fetch_day(state, None, DataSource::Live, Utc::now())
            .await
        {
            Ok(records) if records.is_empty() => {
                MarketDataResponse::failed(state, None, QuerySource::None, NO_RECENT_DATA)
            }
            Ok(mut records) => {
                self.persist(state, &records).await;
                sort_by_date_desc(&mut records);
                MarketDataResponse::found(
                    state,
                    None,
                    QuerySource::Upstream,
                    Self::page(records, limit, offset),
                )
            }
            Err(e) => {
                warn!("Upstream fetch failed for {} (latest): {}", state, e);
                MarketDataResponse::failed(state, None, QuerySource::Error, e.to_string())
            }
        }
    }

    /// The latest dataset for a state, or the error to report in-band.
    async fn latest_dataset(&self, state: &str) -> std::result::Result<Vec<CommodityPrice>, String> {
        let response = self.latest_query(state, MAX_QUERY_LIMIT, 0).await;
        match response.source {
            QuerySource::Error => Err(response
                .error
                .unwrap_or_else(|| "unknown failure".to_string())),
            _ => Ok(response.data),
        }
    }
}

/// Groups records by commodity and computes per-kg statistics.
fn summarize<'a>(
    records: impl IntoIterator<Item = &'a CommodityPrice>,
) -> BTreeMap<String, CommoditySummary> {
    let mut groups: BTreeMap<&str, (Vec<Decimal>, BTreeSet<&str>)> = BTreeMap::new();
    for record in records {
        let (prices, markets) = groups.entry(record.commodity.as_str()).or_default();
        prices.push(per_tonne_to_per_kg(record.modal_price));
        markets.insert(record.market.as_str());
    }

    groups
        .into_iter()
        .filter_map(|(commodity, (prices, markets))| {
            let min_price = prices.iter().copied().min()?;
            let max_price = prices.iter().copied().max()?;
            let sum: Decimal = prices.iter().copied().sum();
            Some((
                commodity.to_string(),
                CommoditySummary {
                    min_price,
                    max_price,
                    avg_price: round_display(sum / Decimal::from(prices.len())),
                    market_count: markets.len(),
                    markets: markets.into_iter().map(str::to_string).collect(),
                    price_spread: max_price - min_price,
                    total_records: prices.len(),
                },
            ))
        })
        .collect()
}

#[async_trait]
impl PriceQueryServiceTrait for PriceQueryService {
    async fn get_market_data(
        &self,
        state: &str,
        date: Option<NaiveDate>,
        limit: usize,
        offset: usize,
    ) -> Result<MarketDataResponse> {
        Self::validate_point_query(state, limit)?;
        let state = state.trim();

        let response = match date {
            Some(date) => self.dated_query(state, date, limit, offset).await,
            None => self.latest_query(state, limit, offset).await,
        };
        debug!(
            "Point query {} {:?}: {} records from {:?}",
            state, date, response.total_records, response.source
        );
        Ok(response)
    }

    fn get_filtered_market_data(&self, filter: &PriceFilter) -> Result<FilteredMarketDataResponse> {
        Self::validate_point_query(&filter.state, filter.limit)?;

        let end_date = filter.end_date.unwrap_or_else(|| Utc::now().date_naive());
        let start_date = filter
            .start_date
            .unwrap_or(end_date - Duration::days(DEFAULT_FILTER_WINDOW_DAYS));
        if start_date > end_date {
            return Err(ValidationError::InvalidInput(format!(
                "start_date {} is after end_date {}",
                start_date, end_date
            ))
            .into());
        }

        let resolved = PriceFilter {
            state: filter.state.trim().to_string(),
            commodity: filter.commodity.clone(),
            market: filter.market.clone(),
            start_date: Some(start_date),
            end_date: Some(end_date),
            limit: filter.limit,
        };
        let filters_applied = FiltersApplied {
            state: resolved.state.clone(),
            commodity: resolved.commodity.clone(),
            market: resolved.market.clone(),
            start_date,
            end_date,
            limit: resolved.limit,
        };
        let date_range = QueryDateRange {
            start_date,
            end_date,
            days: (end_date - start_date).num_days(),
        };

        let (data, error) = match self.store.filter(&resolved) {
            Ok(mut records) => {
                records.truncate(resolved.limit);
                (records, None)
            }
            Err(e) => {
                error!("Range query failed for {}: {}", resolved.state, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        Ok(FilteredMarketDataResponse {
            success: error.is_none(),
            total_records: data.len(),
            data,
            filters_applied,
            date_range,
            error,
        })
    }

    async fn get_bulk_market_data(
        &self,
        date: Option<NaiveDate>,
        states: Option<Vec<String>>,
        limit: usize,
        offset: usize,
    ) -> Result<BulkMarketDataResponse> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let states = states
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.cache.config().hot_states.clone());

        info!("Bulk query for {:?} on {}", states, date);

        let mut data = BTreeMap::new();
        let mut total_records = 0;
        for state in &states {
            let records = match self.get_market_data(state, Some(date), limit, offset).await {
                Ok(response) if response.success => response.data,
                Ok(response) => {
                    debug!("Bulk query: {} returned no data ({:?})", state, response.error);
                    Vec::new()
                }
                Err(e) => {
                    warn!("Bulk query failed for {}: {}", state, e);
                    Vec::new()
                }
            };
            total_records += records.len();
            data.insert(state.clone(), records);
        }

        Ok(BulkMarketDataResponse {
            success: true,
            data,
            total_records,
            states_included: states,
            date: Some(date),
            source: QuerySource::Bulk,
        })
    }

    async fn get_price_summary(
        &self,
        state: &str,
        commodity: Option<&str>,
    ) -> Result<PriceSummaryResponse> {
        if state.trim().is_empty() {
            return Err(ValidationError::MissingField("state".to_string()).into());
        }
        let state = state.trim();
        let commodity = commodity.map(str::trim).filter(|c| !c.is_empty());

        let mut response = PriceSummaryResponse {
            success: true,
            state: state.to_string(),
            commodity_filter: commodity.map(str::to_string),
            total_commodities: 0,
            summary: BTreeMap::new(),
            message: None,
            error: None,
        };

        let records = match self.latest_dataset(state).await {
            Ok(records) => records,
            Err(e) => {
                response.success = false;
                response.error = Some(format!("Failed to calculate price summary: {}", e));
                return Ok(response);
            }
        };
        if records.is_empty() {
            response.message = Some(format!("No market data found for {}", state));
            return Ok(response);
        }

        let summary = match commodity {
            Some(wanted) => {
                summarize(records.iter().filter(|r| names_match(&r.commodity, wanted)))
            }
            None => summarize(&records),
        };
        if let (Some(wanted), true) = (commodity, summary.is_empty()) {
            response.message = Some(format!("No data found for {} in {}", wanted, state));
            return Ok(response);
        }

        response.total_commodities = summary.len();
        response.summary = summary;
        Ok(response)
    }

    async fn calculate_revenue(
        &self,
        state: &str,
        commodity: &str,
        quantity_kg: Decimal,
    ) -> Result<RevenueResponse> {
        if state.trim().is_empty() {
            return Err(ValidationError::MissingField("state".to_string()).into());
        }
        if commodity.trim().is_empty() {
            return Err(ValidationError::MissingField("commodity".to_string()).into());
        }
        if quantity_kg <= Decimal::ZERO {
            return Err(ValidationError::InvalidInput(format!(
                "quantity_kg must be positive, got {}",
                quantity_kg
            ))
            .into());
        }
        let state = state.trim();
        let commodity = commodity.trim();

        let records = match self.latest_dataset(state).await {
            Ok(records) => records,
            Err(e) => {
                return Ok(RevenueResponse::failed(
                    state,
                    commodity,
                    quantity_kg,
                    format!("Failed to calculate revenue: {}", e),
                    Vec::new(),
                ));
            }
        };

        let matching: Vec<&CommodityPrice> = records
            .iter()
            .filter(|r| names_match(&r.commodity, commodity))
            .collect();
        let summary = summarize(matching.iter().copied());
        let Some((matched_name, stats)) = summary.into_iter().next() else {
            let available: BTreeSet<String> =
                records.iter().map(|r| r.commodity.clone()).collect();
            return Ok(RevenueResponse::failed(
                state,
                commodity,
                quantity_kg,
                format!("No price data found for {} in {}", commodity, state),
                available.into_iter().collect(),
            ));
        };

        let min_revenue = stats.min_price * quantity_kg;
        let max_revenue = stats.max_price * quantity_kg;
        let revenue_analysis = RevenueAnalysis {
            minimum_revenue: round_display(min_revenue),
            maximum_revenue: round_display(max_revenue),
            average_revenue: round_display(stats.avg_price * quantity_kg),
            potential_profit_range: round_display(max_revenue - min_revenue),
        };

        // Markets are ranked within the analysed commodity only; a market seen
        // more than once keeps its last listed price.
        let mut all_market_prices = BTreeMap::new();
        let mut best: Option<(&str, Decimal)> = None;
        let mut worst: Option<(&str, Decimal)> = None;
        for record in matching.iter().filter(|r| r.commodity == matched_name) {
            let price = per_tonne_to_per_kg(record.modal_price);
            all_market_prices.insert(record.market.clone(), price);
            if best.map_or(true, |(_, p)| price > p) {
                best = Some((record.market.as_str(), price));
            }
            if worst.map_or(true, |(_, p)| price < p) {
                worst = Some((record.market.as_str(), price));
            }
        }
        let market_recommendations = best.zip(worst).map(
            |((best_market, best_price), (worst_market, worst_price))| MarketRecommendations {
                best_market: best_market.to_string(),
                best_price,
                worst_market: worst_market.to_string(),
                worst_price,
                all_market_prices,
            },
        );

        Ok(RevenueResponse {
            success: true,
            state: state.to_string(),
            commodity: matched_name,
            quantity_kg,
            revenue_analysis: Some(revenue_analysis),
            price_analysis: Some(PriceAnalysis {
                min_price_per_kg: stats.min_price,
                max_price_per_kg: stats.max_price,
                avg_price_per_kg: stats.avg_price,
                price_variation: stats.price_spread,
            }),
            market_recommendations,
            num_markets_analyzed: stats.market_count,
            error: None,
            suggestions: Vec::new(),
        })
    }

    fn commodity_trend(
        &self,
        state: &str,
        commodity: &str,
        days_back: u32,
    ) -> Result<Vec<CommodityPrice>> {
        self.cache
            .commodity_trend(state.trim(), commodity, days_back, Utc::now().date_naive())
    }

    fn market_comparison(
        &self,
        state: &str,
        commodity: &str,
        markets: Option<&[String]>,
    ) -> Result<Vec<MarketComparison>> {
        self.cache.market_comparison(state.trim(), commodity, markets)
    }

    async fn update_price(&self, update: &PriceUpdate) -> Result<PriceUpdateResponse> {
        let key = &update.key;
        for (field, value) in [
            ("state", &key.state),
            ("market", &key.market),
            ("commodity", &key.commodity),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field.to_string()).into());
            }
        }
        if update.new_price < Decimal::ZERO {
            return Err(ValidationError::InvalidInput(format!(
                "new_price must not be negative, got {}",
                update.new_price
            ))
            .into());
        }

        let mut response = PriceUpdateResponse {
            success: false,
            message: String::new(),
            state: key.state.clone(),
            market: key.market.clone(),
            commodity: key.commodity.clone(),
            date: key.date,
            old_price: None,
            new_price: None,
            version: None,
        };

        match self.store.update_price(update).await {
            Ok(outcome) => {
                info!(
                    "Updated {} by {}: {} -> {} (v{})",
                    key, update.updated_by, outcome.old_price, outcome.new_price, outcome.version
                );
                response.success = true;
                response.message = format!("Updated {} price in {}", key.commodity, key.market);
                response.old_price = Some(outcome.old_price);
                response.new_price = Some(outcome.new_price);
                response.version = Some(outcome.version);
                Ok(response)
            }
            Err(Error::NotFound(_)) => {
                response.message = format!(
                    "No record found for {} in {}, {} on {}",
                    key.commodity, key.market, key.state, key.date
                );
                Ok(response)
            }
            Err(e) => Err(e),
        }
    }

    fn cache_status(&self) -> CacheStatus {
        self.cache.status()
    }

    async fn refresh_cache(&self) -> LoadOutcome {
        self.cache.refresh().await
    }
}
