//! In-memory daily price cache.
//!
//! Preloads a fixed set of hot states over a trailing window of days so that
//! trend and comparison queries never touch the upstream provider. The cache is
//! not authoritative: it is rebuilt only by `refresh` or a process restart.
//!
//! ```text
//! NotStarted ──initialize──▶ Loading ──▶ Loaded
//!                               │
//!                               └──────▶ Error   (zero records across all targets)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::client::UpstreamClient;
use super::constants::DEFAULT_HOT_STATES;
use super::matching::names_match;
use super::model::CommodityPrice;
use super::types::DataSource;
use super::units::{per_tonne_to_per_kg, round_display};
use crate::errors::{Error, Result};

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub hot_states: Vec<String>,
    /// Days loaded before today; the window is `[today - window_days, today]`.
    pub window_days: u32,
    /// Pause between consecutive dates of one state.
    pub date_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_states: DEFAULT_HOT_STATES.iter().map(|s| s.to_string()).collect(),
            window_days: 180,
            date_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    NotStarted,
    Loading,
    Loaded,
    Error,
}

/// What a call to `initialize` or `refresh` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { total_records: usize },
    AlreadyLoaded,
    /// Another load is in progress.
    NotReady,
    /// Every target failed or came back empty.
    Failed { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCoverage {
    pub records: usize,
    pub dates: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub loading_status: LoadState,
    pub last_updated: Option<DateTime<Utc>>,
    pub total_records: usize,
    pub states: BTreeMap<String, StateCoverage>,
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Per-market aggregate of one commodity's modal prices, per kg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketComparison {
    pub market: String,
    pub record_count: usize,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub avg_price: Decimal,
    pub latest_date: NaiveDate,
    pub latest_price: Decimal,
}

#[derive(Default)]
struct CacheInner {
    load_state: LoadState,
    index: HashMap<String, BTreeMap<NaiveDate, Vec<CommodityPrice>>>,
    last_updated: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Process-local cache of hot-state listings keyed by state and day.
pub struct DailyPriceCache {
    client: Arc<UpstreamClient>,
    config: CacheConfig,
    load_guard: Mutex<()>,
    inner: RwLock<CacheInner>,
}

impl DailyPriceCache {
    pub fn new(client: Arc<UpstreamClient>, config: CacheConfig) -> Self {
        Self {
            client,
            config,
            load_guard: Mutex::new(()),
            inner: RwLock::new(CacheInner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(|poisoned| {
            warn!("Price cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(|poisoned| {
            warn!("Price cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn load_state(&self) -> LoadState {
        self.read().load_state
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state() == LoadState::Loaded
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load the cache unless it is already loaded or loading.
    pub async fn initialize(&self) -> LoadOutcome {
        if self.is_loaded() {
            return LoadOutcome::AlreadyLoaded;
        }
        let Ok(_guard) = self.load_guard.try_lock() else {
            debug!("Cache load already in progress");
            return LoadOutcome::NotReady;
        };
        // A load may have finished between the check and the lock.
        if self.is_loaded() {
            return LoadOutcome::AlreadyLoaded;
        }
        self.load(Utc::now().date_naive()).await
    }

    /// Drop everything and load again.
    pub async fn refresh(&self) -> LoadOutcome {
        let Ok(_guard) = self.load_guard.try_lock() else {
            debug!("Cache refresh skipped, load in progress");
            return LoadOutcome::NotReady;
        };
        info!("Refreshing price cache");
        self.reset();
        self.load(Utc::now().date_naive()).await
    }

    /// Empty the cache and return it to `NotStarted`.
    ///
    /// A load in progress keeps running and repopulates it when done.
    pub fn clear(&self) {
        self.reset();
    }

    fn reset(&self) {
        let mut inner = self.write();
        *inner = CacheInner::default();
    }

    async fn load(&self, today: NaiveDate) -> LoadOutcome {
        {
            let mut inner = self.write();
            inner.load_state = LoadState::Loading;
            inner.last_error = None;
        }

        let start = today - chrono::Duration::days(i64::from(self.config.window_days));
        info!(
            "Loading price cache for {:?} from {} to {}",
            self.config.hot_states, start, today
        );

        let mut index: HashMap<String, BTreeMap<NaiveDate, Vec<CommodityPrice>>> = HashMap::new();
        let mut total = 0usize;
        let mut failures = 0usize;

        for state in &self.config.hot_states {
            let mut day = start;
            while day <= today {
                match self
                    .client
                    .fetch_day(state, Some(day), DataSource::Live, Utc::now())
                    .await
                {
                    Ok(records) if records.is_empty() => {}
                    Ok(records) => {
                        total += records.len();
                        index
                            .entry(state.clone())
                            .or_default()
                            .insert(day, records);
                    }
                    Err(e) => {
                        failures += 1;
                        warn!("Cache load failed for {} on {}: {}", state, day, e);
                    }
                }

                if !self.config.date_delay.is_zero() {
                    tokio::time::sleep(self.config.date_delay).await;
                }
                match day.succ_opt() {
                    Some(next) => day = next,
                    None => break,
                }
            }

            let loaded = index.get(state).map(|d| d.values().map(Vec::len).sum::<usize>());
            info!("Cached {} records for {}", loaded.unwrap_or(0), state);
        }

        let mut inner = self.write();
        if total == 0 {
            let reason = format!(
                "no records loaded for {} states ({} failed requests)",
                self.config.hot_states.len(),
                failures
            );
            error!("Price cache load failed: {}", reason);
            inner.load_state = LoadState::Error;
            inner.last_error = Some(reason.clone());
            return LoadOutcome::Failed { reason };
        }

        inner.index = index;
        inner.load_state = LoadState::Loaded;
        inner.last_updated = Some(Utc::now());
        info!(
            "Price cache loaded: {} records, {} failed requests",
            total, failures
        );
        LoadOutcome::Loaded {
            total_records: total,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn ensure_loaded(inner: &CacheInner) -> Result<()> {
        match inner.load_state {
            LoadState::Loaded => Ok(()),
            other => Err(Error::CacheNotReady(format!("cache is {:?}", other))),
        }
    }

    /// Records for one state and day, or `None` when the cache does not hold them.
    pub fn get_day(&self, state: &str, date: NaiveDate) -> Result<Option<Vec<CommodityPrice>>> {
        let inner = self.read();
        Self::ensure_loaded(&inner)?;
        Ok(inner
            .index
            .get(state)
            .and_then(|days| days.get(&date))
            .cloned())
    }

    /// Name-matching records within `[today - days_back, today]`, newest first.
    pub fn commodity_trend(
        &self,
        state: &str,
        commodity: &str,
        days_back: u32,
        today: NaiveDate,
    ) -> Result<Vec<CommodityPrice>> {
        let inner = self.read();
        Self::ensure_loaded(&inner)?;

        let start = today - chrono::Duration::days(i64::from(days_back));
        let Some(days) = inner.index.get(state) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<CommodityPrice> = days
            .range(start..=today)
            .rev()
            .flat_map(|(_, records)| records.iter())
            .filter(|r| names_match(&r.commodity, commodity))
            .cloned()
            .collect();
        super::filter::sort_by_date_desc(&mut records);
        Ok(records)
    }

    /// Per-market aggregates for a commodity, optionally restricted to `markets`.
    pub fn market_comparison(
        &self,
        state: &str,
        commodity: &str,
        markets: Option<&[String]>,
    ) -> Result<Vec<MarketComparison>> {
        let inner = self.read();
        Self::ensure_loaded(&inner)?;

        let Some(days) = inner.index.get(state) else {
            return Ok(Vec::new());
        };

        let wanted = |market: &str| {
            markets.map_or(true, |list| {
                list.iter().any(|m| m.trim().eq_ignore_ascii_case(market.trim()))
            })
        };

        let mut per_market: BTreeMap<&str, Vec<&CommodityPrice>> = BTreeMap::new();
        for record in days.values().flatten() {
            if names_match(&record.commodity, commodity) && wanted(&record.market) {
                per_market.entry(record.market.as_str()).or_default().push(record);
            }
        }

        Ok(per_market
            .into_iter()
            .filter_map(|(market, records)| {
                let prices: Vec<Decimal> = records
                    .iter()
                    .map(|r| per_tonne_to_per_kg(r.modal_price))
                    .collect();
                let latest = records.iter().max_by_key(|r| r.date)?;
                let sum: Decimal = prices.iter().copied().sum();
                Some(MarketComparison {
                    market: market.to_string(),
                    record_count: records.len(),
                    min_price: prices.iter().copied().min()?,
                    max_price: prices.iter().copied().max()?,
                    avg_price: round_display(sum / Decimal::from(prices.len())),
                    latest_date: latest.date,
                    latest_price: per_tonne_to_per_kg(latest.modal_price),
                })
            })
            .collect())
    }

    pub fn status(&self) -> CacheStatus {
        let inner = self.read();

        let mut states = BTreeMap::new();
        let mut total_records = 0;
        let mut first: Option<NaiveDate> = None;
        let mut last: Option<NaiveDate> = None;

        for (state, days) in &inner.index {
            let records: usize = days.values().map(Vec::len).sum();
            total_records += records;
            if let Some((d, _)) = days.first_key_value() {
                first = Some(first.map_or(*d, |f| f.min(*d)));
            }
            if let Some((d, _)) = days.last_key_value() {
                last = Some(last.map_or(*d, |l| l.max(*d)));
            }
            states.insert(
                state.clone(),
                StateCoverage {
                    records,
                    dates: days.len(),
                },
            );
        }

        CacheStatus {
            loading_status: inner.load_state,
            last_updated: inner.last_updated,
            total_records,
            states,
            date_range: first.zip(last).map(|(start_date, end_date)| DateRange {
                start_date,
                end_date,
            }),
            last_error: inner.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::test_support::{client_for, FixtureProvider};
    use rust_decimal_macros::dec;

    fn config(states: &[&str], window_days: u32) -> CacheConfig {
        CacheConfig {
            hot_states: states.iter().map(|s| s.to_string()).collect(),
            window_days,
            date_delay: Duration::ZERO,
        }
    }

    fn listings() -> Vec<(&'static str, &'static str, i64)> {
        vec![
            ("Kolar", "Tomato", 3000),
            ("Binny Mill", "Tomatoes", 2000),
            ("Kolar", "Onion Seed", 90000),
            ("Mysore", "Green Chilli", 4000),
        ]
    }

    #[tokio::test]
    async fn test_queries_fail_before_load() {
        let provider = Arc::new(FixtureProvider::new(listings()));
        let cache = DailyPriceCache::new(client_for(provider), config(&["Karnataka"], 1));
        let today = Utc::now().date_naive();

        assert!(matches!(
            cache.get_day("Karnataka", today),
            Err(Error::CacheNotReady(_))
        ));
        assert!(matches!(
            cache.commodity_trend("Karnataka", "Tomato", 7, today),
            Err(Error::CacheNotReady(_))
        ));
        assert_eq!(cache.status().loading_status, LoadState::NotStarted);
    }

    #[tokio::test]
    async fn test_initialize_loads_window_and_reports_status() {
        let provider = Arc::new(FixtureProvider::new(listings()));
        let cache = DailyPriceCache::new(client_for(provider.clone()), config(&["Karnataka"], 2));

        let outcome = cache.initialize().await;
        assert_eq!(outcome, LoadOutcome::Loaded { total_records: 12 });
        assert_eq!(provider.calls(), 3);

        let status = cache.status();
        assert_eq!(status.loading_status, LoadState::Loaded);
        assert_eq!(status.total_records, 12);
        assert_eq!(
            status.states.get("Karnataka"),
            Some(&StateCoverage {
                records: 12,
                dates: 3
            })
        );
        let range = status.date_range.unwrap();
        assert_eq!((range.end_date - range.start_date).num_days(), 2);
        assert!(status.last_updated.is_some());

        assert_eq!(cache.initialize().await, LoadOutcome::AlreadyLoaded);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_runs_one_load() {
        let provider = Arc::new(
            FixtureProvider::new(listings()).with_delay(Duration::from_millis(50)),
        );
        let cache = DailyPriceCache::new(client_for(provider.clone()), config(&["Karnataka"], 0));

        let (first, second) = tokio::join!(cache.initialize(), async {
            tokio::task::yield_now().await;
            cache.initialize().await
        });

        assert_eq!(first, LoadOutcome::Loaded { total_records: 4 });
        assert_eq!(second, LoadOutcome::NotReady);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_state_is_skipped() {
        let provider = Arc::new(FixtureProvider::new(listings()).failing_state("Punjab"));
        let cache = DailyPriceCache::new(
            client_for(provider),
            config(&["Karnataka", "Punjab"], 0),
        );

        assert_eq!(
            cache.initialize().await,
            LoadOutcome::Loaded { total_records: 4 }
        );
        let status = cache.status();
        assert!(status.states.contains_key("Karnataka"));
        assert!(!status.states.contains_key("Punjab"));
    }

    #[tokio::test]
    async fn test_zero_records_marks_error() {
        let provider = Arc::new(FixtureProvider::new(listings()).failing_state("Punjab"));
        let cache = DailyPriceCache::new(client_for(provider), config(&["Punjab"], 1));

        assert!(matches!(cache.initialize().await, LoadOutcome::Failed { .. }));
        let status = cache.status();
        assert_eq!(status.loading_status, LoadState::Error);
        assert!(status.last_error.is_some());
        assert!(cache.get_day("Punjab", Utc::now().date_naive()).is_err());
    }

    #[tokio::test]
    async fn test_trend_uses_name_matching_and_window() {
        let provider = Arc::new(FixtureProvider::new(listings()));
        let cache = DailyPriceCache::new(client_for(provider), config(&["Karnataka"], 5));
        cache.initialize().await;
        let today = Utc::now().date_naive();

        let trend = cache.commodity_trend("Karnataka", "tomato", 2, today).unwrap();
        // Tomato and Tomatoes on 3 days; Onion Seed never matches.
        assert_eq!(trend.len(), 6);
        assert!(trend.windows(2).all(|w| w[0].date >= w[1].date));
        assert_eq!(trend[0].date, today);

        assert!(cache
            .commodity_trend("Karnataka", "onion", 5, today)
            .unwrap()
            .is_empty());
        assert!(cache
            .commodity_trend("Kerala", "tomato", 5, today)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_market_comparison_aggregates_per_market() {
        let provider = Arc::new(FixtureProvider::new(listings()));
        let cache = DailyPriceCache::new(client_for(provider), config(&["Karnataka"], 1));
        cache.initialize().await;

        let comparison = cache.market_comparison("Karnataka", "Tomato", None).unwrap();
        assert_eq!(comparison.len(), 2);

        let kolar = comparison.iter().find(|c| c.market == "Kolar").unwrap();
        assert_eq!(kolar.record_count, 2);
        assert_eq!(kolar.min_price, dec!(3));
        assert_eq!(kolar.avg_price, dec!(3));
        assert_eq!(kolar.latest_price, dec!(3));
        assert_eq!(kolar.latest_date, Utc::now().date_naive());

        let only = ["binny mill".to_string()];
        let filtered = cache
            .market_comparison("Karnataka", "Tomato", Some(&only))
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].market, "Binny Mill");
        assert_eq!(filtered[0].max_price, dec!(2));
    }

    #[tokio::test]
    async fn test_clear_and_refresh() {
        let provider = Arc::new(FixtureProvider::new(listings()));
        let cache = DailyPriceCache::new(client_for(provider.clone()), config(&["Karnataka"], 0));
        cache.initialize().await;

        cache.clear();
        assert_eq!(cache.load_state(), LoadState::NotStarted);
        assert_eq!(cache.status().total_records, 0);

        assert_eq!(
            cache.refresh().await,
            LoadOutcome::Loaded { total_records: 4 }
        );
        assert_eq!(provider.calls(), 2);
    }
}
