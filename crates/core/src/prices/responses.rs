//! Response shapes returned by the query engine.
//!
//! Component failures are reported in-band (`success: false`, `error`) rather
//! than as `Err`, so callers always get a uniform envelope.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::model::CommodityPrice;

/// Where a point query's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    Cache,
    Store,
    Upstream,
    None,
    Error,
    Bulk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataResponse {
    pub success: bool,
    pub data: Vec<CommodityPrice>,
    pub source: QuerySource,
    pub state: String,
    pub date: Option<NaiveDate>,
    pub total_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MarketDataResponse {
    pub(crate) fn found(
        state: &str,
        date: Option<NaiveDate>,
        source: QuerySource,
        data: Vec<CommodityPrice>,
    ) -> Self {
        Self {
            success: true,
            total_records: data.len(),
            data,
            source,
            state: state.to_string(),
            date,
            error: None,
        }
    }

    pub(crate) fn failed(
        state: &str,
        date: Option<NaiveDate>,
        source: QuerySource,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            source,
            state: state.to_string(),
            date,
            total_records: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiltersApplied {
    pub state: String,
    pub commodity: Option<String>,
    pub market: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredMarketDataResponse {
    pub success: bool,
    pub data: Vec<CommodityPrice>,
    pub total_records: usize,
    pub filters_applied: FiltersApplied,
    pub date_range: QueryDateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Statistics for one commodity, per kg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommoditySummary {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub avg_price: Decimal,
    pub market_count: usize,
    pub markets: Vec<String>,
    pub price_spread: Decimal,
    pub total_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSummaryResponse {
    pub success: bool,
    pub state: String,
    pub commodity_filter: Option<String>,
    pub total_commodities: usize,
    pub summary: BTreeMap<String, CommoditySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueAnalysis {
    pub minimum_revenue: Decimal,
    pub maximum_revenue: Decimal,
    pub average_revenue: Decimal,
    pub potential_profit_range: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAnalysis {
    pub min_price_per_kg: Decimal,
    pub max_price_per_kg: Decimal,
    pub avg_price_per_kg: Decimal,
    pub price_variation: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecommendations {
    pub best_market: String,
    pub best_price: Decimal,
    pub worst_market: String,
    pub worst_price: Decimal,
    pub all_market_prices: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueResponse {
    pub success: bool,
    pub state: String,
    pub commodity: String,
    pub quantity_kg: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_analysis: Option<RevenueAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_analysis: Option<PriceAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_recommendations: Option<MarketRecommendations>,
    pub num_markets_analyzed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl RevenueResponse {
    pub(crate) fn failed(
        state: &str,
        commodity: &str,
        quantity_kg: Decimal,
        error: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            state: state.to_string(),
            commodity: commodity.to_string(),
            quantity_kg,
            revenue_analysis: None,
            price_analysis: None,
            market_recommendations: None,
            num_markets_analyzed: 0,
            error: Some(error.into()),
            suggestions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdateResponse {
    pub success: bool,
    pub message: String,
    pub state: String,
    pub market: String,
    pub commodity: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkMarketDataResponse {
    pub success: bool,
    pub data: BTreeMap<String, Vec<CommodityPrice>>,
    pub total_records: usize,
    pub states_included: Vec<String>,
    pub date: Option<NaiveDate>,
    pub source: QuerySource,
}
