use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use mandi_core::prices::{
    BackfillConfig, BackfillLoader, CacheConfig, ClientConfig, DailyPriceCache, LatestSync,
    PriceQueryService, PriceQueryServiceTrait, PriceStore, SyncConfig, UpstreamClient,
};
use mandi_market_data::{DataGovConfig, DataGovProvider, PaginationBudget, PriceProvider};
use mandi_storage_sqlite::{db, PriceRepository};

pub struct AppState {
    pub query_service: Arc<dyn PriceQueryServiceTrait>,
    pub cache: Arc<DailyPriceCache>,
    pub backfill_loader: Arc<BackfillLoader>,
    pub latest_sync: Arc<LatestSync>,
    pub hot_states: Vec<String>,
    pub db_path: String,
}

pub fn init_tracing() {
    let log_format = std::env::var("MANDI_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Builds the provider described by `config`.
pub fn build_provider(config: &Config) -> Arc<dyn PriceProvider> {
    if config.data_gov_api_key.is_none() {
        tracing::warn!("DATA_GOV_API_KEY is not set; upstream fetches will fail");
    }
    Arc::new(DataGovProvider::new(DataGovConfig {
        api_key: config.data_gov_api_key.clone(),
        base_url: config.data_gov_base_url.clone(),
        resource_id: config.data_gov_resource_id.clone(),
        requests_per_minute: config.requests_per_minute,
        ..DataGovConfig::default()
    }))
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    build_state_with_provider(config, build_provider(config)).await
}

/// Wires storage, cache and services around an explicit provider.
pub async fn build_state_with_provider(
    config: &Config,
    provider: Arc<dyn PriceProvider>,
) -> anyhow::Result<Arc<AppState>> {
    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = db::spawn_writer((*pool).clone());
    let store: Arc<dyn PriceStore> = Arc::new(PriceRepository::new(pool.clone(), writer));

    let client = Arc::new(UpstreamClient::new(
        provider,
        ClientConfig {
            budget: PaginationBudget {
                page_size: config.page_size.max(1),
                ..PaginationBudget::default()
            },
        },
    ));
    tracing::info!("Upstream provider: {}", client.provider_id());

    let cache = Arc::new(DailyPriceCache::new(
        client.clone(),
        CacheConfig {
            hot_states: config.hot_states.clone(),
            window_days: config.cache_window_days,
            ..CacheConfig::default()
        },
    ));

    let query_service: Arc<dyn PriceQueryServiceTrait> = Arc::new(PriceQueryService::new(
        store.clone(),
        client.clone(),
        cache.clone(),
    ));
    let backfill_loader = Arc::new(BackfillLoader::new(
        client.clone(),
        store.clone(),
        BackfillConfig {
            request_delay: config.backfill_delay,
        },
    ));
    let latest_sync = Arc::new(LatestSync::new(client, store, SyncConfig::default()));

    Ok(Arc::new(AppState {
        query_service,
        cache,
        backfill_loader,
        latest_sync,
        hot_states: config.hot_states.clone(),
        db_path,
    }))
}
