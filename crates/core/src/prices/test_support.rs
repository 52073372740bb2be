//! Mocks shared by the price module tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use mandi_market_data::{
    format_arrival_date, MarketDataError, PageRequest, PricePage, PriceProvider, RateLimit,
    RawPriceRow,
};

use super::client::{ClientConfig, UpstreamClient};
use super::model::{CommodityPrice, PriceUpdate, PriceUpdateOutcome};
use super::store::PriceStore;
use super::types::{DataSource, NaturalKey};
use crate::errors::{DatabaseError, Error, Result};

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

/// A live record with min/max set 10% around the modal price (per tonne).
pub fn record(state: &str, day: &str, market: &str, commodity: &str, modal: i64) -> CommodityPrice {
    let modal = Decimal::from(modal);
    let row = RawPriceRow {
        state: state.to_string(),
        district: market.to_string(),
        market: market.to_string(),
        commodity: commodity.to_string(),
        variety: "Local".to_string(),
        grade: "FAQ".to_string(),
        arrival_date: format_arrival_date(date(day)),
        min_price: Some(modal * Decimal::new(9, 1)),
        max_price: Some(modal * Decimal::new(11, 1)),
        modal_price: Some(modal),
    };
    CommodityPrice::from_raw(row, Some(date(day)), DataSource::Live, Utc::now()).unwrap()
}

// =========================================================================
// Mock PriceStore
// =========================================================================

#[derive(Clone, Default)]
pub struct MockPriceStore {
    records: Arc<Mutex<Vec<CommodityPrice>>>,
    fail: Arc<Mutex<bool>>,
    writes: Arc<AtomicUsize>,
}

impl MockPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CommodityPrice>) -> Self {
        let store = Self::new();
        *store.records.lock().unwrap() = records;
        store
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn all(&self) -> Vec<CommodityPrice> {
        self.records.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.all().into_iter().map(|r| r.id).collect();
        ids.sort();
        ids
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(Error::StoreUnavailable(DatabaseError::ConnectionFailed(
                "mock store offline".to_string(),
            )));
        }
        Ok(())
    }

    fn live(&self) -> Vec<CommodityPrice> {
        let now = Utc::now();
        self.all().into_iter().filter(|r| !r.is_expired(now)).collect()
    }
}

#[async_trait]
impl PriceStore for MockPriceStore {
    async fn batch_write(&self, records: &[CommodityPrice]) -> Result<usize> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut stored = self.records.lock().unwrap();
        for record in records {
            stored.retain(|r| r.id != record.id);
            stored.push(record.clone());
        }
        Ok(records.len())
    }

    async fn update_price(&self, update: &PriceUpdate) -> Result<PriceUpdateOutcome> {
        self.check()?;
        let id = update.key.storage_id();
        let now = Utc::now();
        let mut stored = self.records.lock().unwrap();
        let record = stored
            .iter_mut()
            .find(|r| r.id == id && !r.is_expired(now))
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        if let Some(expected) = update.expected_version {
            if expected != record.version {
                return Err(Error::Conflict {
                    key: id,
                    expected,
                    actual: record.version,
                });
            }
        }

        let old_price = record.modal_price;
        record.modal_price = update.new_price;
        record.version += 1;
        record.last_updated = Some(now);
        record.updated_by = Some(update.updated_by.clone());
        Ok(PriceUpdateOutcome {
            old_price,
            new_price: update.new_price,
            version: record.version,
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.check()?;
        let mut stored = self.records.lock().unwrap();
        let before = stored.len();
        stored.retain(|r| !r.is_expired(now));
        Ok(before - stored.len())
    }

    fn get(
        &self,
        state: &str,
        date: NaiveDate,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommodityPrice>> {
        self.check()?;
        let mut records: Vec<_> = self
            .live()
            .into_iter()
            .filter(|r| r.state == state && r.date == date)
            .collect();
        super::filter::sort_by_commodity_market(&mut records);
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    fn scan_state(&self, state: &str, limit: usize) -> Result<Vec<CommodityPrice>> {
        self.check()?;
        Ok(self
            .live()
            .into_iter()
            .filter(|r| r.state == state)
            .take(limit)
            .collect())
    }

    fn scan_range(
        &self,
        state: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<CommodityPrice>> {
        self.check()?;
        let mut records: Vec<_> = self
            .live()
            .into_iter()
            .filter(|r| r.state == state)
            .filter(|r| start_date.map_or(true, |d| r.date >= d))
            .filter(|r| end_date.map_or(true, |d| r.date <= d))
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        records.truncate(limit);
        Ok(records)
    }

    fn get_by_key(&self, key: &NaturalKey) -> Result<Option<CommodityPrice>> {
        self.check()?;
        let id = key.storage_id();
        Ok(self.live().into_iter().find(|r| r.id == id))
    }

    fn has_data(&self, state: &str, date: NaiveDate) -> Result<bool> {
        self.check()?;
        Ok(self
            .live()
            .iter()
            .any(|r| r.state == state && r.date == date))
    }
}

// =========================================================================
// Fixture PriceProvider
// =========================================================================

/// A (market, commodity, modal per tonne) listing served for every state and day.
pub type Listing = (&'static str, &'static str, i64);

pub struct FixtureProvider {
    listings: Vec<Listing>,
    failing_states: HashSet<String>,
    available_dates: Option<HashSet<NaiveDate>>,
    delay: Duration,
    transient_failures: AtomicUsize,
    calls: AtomicUsize,
}

impl FixtureProvider {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self {
            listings,
            failing_states: HashSet::new(),
            available_dates: None,
            delay: Duration::ZERO,
            transient_failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every request for this state fails with HTTP 500.
    pub fn failing_state(mut self, state: &str) -> Self {
        self.failing_states.insert(state.to_string());
        self
    }

    /// Only these days have listings; every other day is empty.
    pub fn only_dates(mut self, dates: &[NaiveDate]) -> Self {
        self.available_dates = Some(dates.iter().copied().collect());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The first `count` requests are rate limited.
    pub fn with_transient_failures(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn rows_for(&self, request: &PageRequest) -> Vec<RawPriceRow> {
        let day = request.date.unwrap_or_else(|| Utc::now().date_naive());
        if let Some(dates) = &self.available_dates {
            if !dates.contains(&day) {
                return Vec::new();
            }
        }
        self.listings
            .iter()
            .map(|(market, commodity, modal)| {
                let modal = Decimal::from(*modal);
                RawPriceRow {
                    state: request.state.clone(),
                    district: market.to_string(),
                    market: market.to_string(),
                    commodity: commodity.to_string(),
                    variety: "Local".to_string(),
                    grade: "FAQ".to_string(),
                    arrival_date: format_arrival_date(day),
                    min_price: Some(modal - Decimal::from(100)),
                    max_price: Some(modal + Decimal::from(100)),
                    modal_price: Some(modal),
                }
            })
            .collect()
    }
}

#[async_trait]
impl PriceProvider for FixtureProvider {
    fn id(&self) -> &'static str {
        "FIXTURE"
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 600_000,
            burst: 1_000,
            min_delay: Duration::ZERO,
        }
    }

    async fn fetch_page(&self, request: &PageRequest) -> std::result::Result<PricePage, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(MarketDataError::RateLimited {
                provider: "FIXTURE".to_string(),
            });
        }

        if self.failing_states.contains(&request.state) {
            return Err(MarketDataError::HttpStatus {
                provider: "FIXTURE".to_string(),
                status: 500,
                message: "upstream exploded".to_string(),
            });
        }

        let rows: Vec<RawPriceRow> = self
            .rows_for(request)
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect();
        Ok(PricePage::from_rows(rows, request.limit))
    }
}

pub fn client_for(provider: Arc<FixtureProvider>) -> Arc<UpstreamClient> {
    Arc::new(UpstreamClient::new(provider, ClientConfig::default()))
}
