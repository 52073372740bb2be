use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use mandi_core::prices::DEFAULT_HOT_STATES;
use mandi_market_data::{DEFAULT_BASE_URL, DEFAULT_RESOURCE_ID};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub data_gov_api_key: Option<String>,
    pub data_gov_base_url: String,
    pub data_gov_resource_id: String,
    pub requests_per_minute: u32,
    pub page_size: usize,
    pub hot_states: Vec<String>,
    pub cache_window_days: u32,
    pub cache_preload: bool,
    /// Pause between backfill fetches.
    pub backfill_delay: Duration,
    /// `None` disables the scheduled sync.
    pub sync_interval: Option<Duration>,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = var_or("MANDI_LISTEN_ADDR", "0.0.0.0:8100")
            .parse()
            .context("Invalid MANDI_LISTEN_ADDR")?;
        let db_path = var_or("MANDI_DB_PATH", "./db/mandi.db");
        let cors_allow = split_list(&var_or("MANDI_CORS_ALLOW_ORIGINS", "*"));
        let timeout_ms: u64 = parse_var("MANDI_REQUEST_TIMEOUT_MS", 120_000);

        let data_gov_api_key = std::env::var("DATA_GOV_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let mut hot_states = split_list(&var_or("MANDI_HOT_STATES", ""));
        if hot_states.is_empty() {
            hot_states = DEFAULT_HOT_STATES.iter().map(|s| s.to_string()).collect();
        }

        let sync_secs: u64 = parse_var("MANDI_SYNC_INTERVAL_SECS", 6 * 60 * 60);

        Ok(Self {
            listen_addr,
            db_path,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            data_gov_api_key,
            data_gov_base_url: var_or("DATA_GOV_BASE_URL", DEFAULT_BASE_URL),
            data_gov_resource_id: var_or("DATA_GOV_RESOURCE_ID", DEFAULT_RESOURCE_ID),
            requests_per_minute: parse_var("MANDI_REQUESTS_PER_MINUTE", 30),
            page_size: parse_var("MANDI_PAGE_SIZE", 1000),
            hot_states,
            cache_window_days: parse_var("MANDI_CACHE_WINDOW_DAYS", 180),
            cache_preload: parse_var("MANDI_CACHE_PRELOAD", false),
            backfill_delay: Duration::from_millis(parse_var("MANDI_BACKFILL_DELAY_MS", 1000)),
            sync_interval: (sync_secs > 0).then(|| Duration::from_secs(sync_secs)),
        })
    }
}
