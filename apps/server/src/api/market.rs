use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use mandi_core::errors::Error as CoreError;
use mandi_core::prices::{
    BackfillRequest, BackfillStats, BulkMarketDataResponse, CacheStatus, CommodityPrice,
    FilteredMarketDataResponse, LoadOutcome, MarketComparison, MarketDataResponse, NaturalKey,
    PriceFilter, PriceSummaryResponse, PriceUpdate, PriceUpdateResponse, RevenueResponse,
    DEFAULT_STATE,
};

const DEFAULT_PAGE_LIMIT: usize = 100;
const DEFAULT_TREND_DAYS: u32 = 30;

fn default_state() -> String {
    DEFAULT_STATE.to_string()
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

fn default_trend_days() -> u32 {
    DEFAULT_TREND_DAYS
}

fn split_csv(value: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = value?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Deserialize)]
struct MarketDataQuery {
    #[serde(default = "default_state")]
    state: String,
    date: Option<NaiveDate>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

async fn get_market_data(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MarketDataQuery>,
) -> ApiResult<Json<MarketDataResponse>> {
    let response = state
        .query_service
        .get_market_data(&q.state, q.date, q.limit, q.offset)
        .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct FilteredQuery {
    #[serde(default = "default_state")]
    state: String,
    commodity: Option<String>,
    market: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    #[serde(default = "default_limit")]
    limit: usize,
}

async fn get_filtered_market_data(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FilteredQuery>,
) -> ApiResult<Json<FilteredMarketDataResponse>> {
    let filter = PriceFilter {
        state: q.state,
        commodity: q.commodity,
        market: q.market,
        start_date: q.start_date,
        end_date: q.end_date,
        limit: q.limit,
    };
    let response = state.query_service.get_filtered_market_data(&filter)?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct BulkQuery {
    date: Option<NaiveDate>,
    states: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

async fn get_bulk_market_data(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BulkQuery>,
) -> ApiResult<Json<BulkMarketDataResponse>> {
    let response = state
        .query_service
        .get_bulk_market_data(q.date, split_csv(q.states.as_deref()), q.limit, q.offset)
        .await?;
    Ok(Json(response))
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Deserialize)]
struct SummaryQuery {
    #[serde(default = "default_state")]
    state: String,
    commodity: Option<String>,
}

async fn get_price_summary(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SummaryQuery>,
) -> ApiResult<Json<PriceSummaryResponse>> {
    let response = state
        .query_service
        .get_price_summary(&q.state, q.commodity.as_deref())
        .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct RevenueQuery {
    #[serde(default = "default_state")]
    state: String,
    commodity: String,
    quantity_kg: Decimal,
}

async fn calculate_revenue(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RevenueQuery>,
) -> ApiResult<Json<RevenueResponse>> {
    let response = state
        .query_service
        .calculate_revenue(&q.state, &q.commodity, q.quantity_kg)
        .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct TrendQuery {
    #[serde(default = "default_state")]
    state: String,
    commodity: String,
    #[serde(default = "default_trend_days")]
    days_back: u32,
}

async fn commodity_trend(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TrendQuery>,
) -> ApiResult<Json<Vec<CommodityPrice>>> {
    let records = state
        .query_service
        .commodity_trend(&q.state, &q.commodity, q.days_back)?;
    Ok(Json(records))
}

#[derive(Deserialize)]
struct CompareQuery {
    #[serde(default = "default_state")]
    state: String,
    commodity: String,
    markets: Option<String>,
}

async fn market_comparison(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CompareQuery>,
) -> ApiResult<Json<Vec<MarketComparison>>> {
    let markets = split_csv(q.markets.as_deref());
    let comparison =
        state
            .query_service
            .market_comparison(&q.state, &q.commodity, markets.as_deref())?;
    Ok(Json(comparison))
}

// ============================================================================
// Mutation
// ============================================================================

#[derive(Deserialize)]
struct UpdatePriceBody {
    state: String,
    market: String,
    commodity: String,
    date: NaiveDate,
    /// Per tonne, like the stored record.
    new_price: Decimal,
    updated_by: Option<String>,
    expected_version: Option<i32>,
}

async fn update_price(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdatePriceBody>,
) -> ApiResult<(StatusCode, Json<PriceUpdateResponse>)> {
    let update = PriceUpdate {
        key: NaturalKey::new(body.state, body.date, body.market, body.commodity),
        new_price: body.new_price,
        updated_by: body.updated_by.unwrap_or_else(|| "api".to_string()),
        expected_version: body.expected_version,
    };
    let response = state.query_service.update_price(&update).await?;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((status, Json(response)))
}

// ============================================================================
// Cache and ingestion
// ============================================================================

async fn cache_status(State(state): State<Arc<AppState>>) -> Json<CacheStatus> {
    Json(state.query_service.cache_status())
}

#[derive(Serialize)]
struct RefreshResponse {
    success: bool,
    total_records: usize,
    message: String,
}

async fn refresh_cache(State(state): State<Arc<AppState>>) -> ApiResult<Json<RefreshResponse>> {
    match state.query_service.refresh_cache().await {
        LoadOutcome::Loaded { total_records } => Ok(Json(RefreshResponse {
            success: true,
            total_records,
            message: format!("Cache loaded with {} records", total_records),
        })),
        LoadOutcome::AlreadyLoaded => Ok(Json(RefreshResponse {
            success: true,
            total_records: state.cache.status().total_records,
            message: "Cache already loaded".to_string(),
        })),
        LoadOutcome::NotReady => Err(CoreError::CacheNotReady(
            "a cache load is already in progress".to_string(),
        )
        .into()),
        LoadOutcome::Failed { reason } => Err(ApiError::Anyhow(anyhow::anyhow!(
            "Cache refresh failed: {}",
            reason
        ))),
    }
}

async fn run_backfill(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BackfillRequest>,
) -> ApiResult<Json<BackfillStats>> {
    tracing::info!(
        "Backfill requested for {:?} from {} to {}",
        request.states,
        request.start_date,
        request.end_date
    );
    let stats = state.backfill_loader.run(&request).await?;
    Ok(Json(stats))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/market/data", get(get_market_data))
        .route("/market/filtered", get(get_filtered_market_data))
        .route("/market/bulk", get(get_bulk_market_data))
        .route("/market/summary", get(get_price_summary))
        .route("/market/revenue", get(calculate_revenue))
        .route("/market/trend", get(commodity_trend))
        .route("/market/compare", get(market_comparison))
        .route("/market/price", put(update_price))
        .route("/market/cache/status", get(cache_status))
        .route("/market/cache/refresh", post(refresh_cache))
        .route("/market/backfill", post(run_backfill))
}
