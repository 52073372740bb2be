//! Bulk historical backfill.
//!
//! Walks every (date, state) unit in a range, fetching the full page set from
//! the upstream client and persisting it with the backfill TTL. A failing unit
//! is logged and counted; the run always continues.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::client::UpstreamClient;
use super::constants::MAX_BACKFILL_RANGE_DAYS;
use super::store::PriceStore;
use super::types::DataSource;
use crate::errors::{Error, Result, ValidationError};

/// Loader configuration.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Pause after each fetched unit.
    pub request_delay: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(1),
        }
    }
}

fn default_skip_existing() -> bool {
    true
}

/// One backfill run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillRequest {
    pub states: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Skip units that already have at least one stored record.
    #[serde(default = "default_skip_existing")]
    pub skip_existing: bool,
}

impl BackfillRequest {
    pub fn validate(&self) -> Result<()> {
        if self.states.iter().all(|s| s.trim().is_empty()) {
            return Err(ValidationError::MissingField("states".to_string()).into());
        }
        if self.start_date > self.end_date {
            return Err(ValidationError::InvalidInput(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            ))
            .into());
        }
        let days = (self.end_date - self.start_date).num_days() + 1;
        if days > MAX_BACKFILL_RANGE_DAYS {
            return Err(ValidationError::InvalidInput(format!(
                "range of {} days exceeds the {} day maximum",
                days, MAX_BACKFILL_RANGE_DAYS
            ))
            .into());
        }
        Ok(())
    }
}

/// Counters for a backfill run.
///
/// `states_processed` counts (date, state) units that completed, whether they
/// stored records or came back empty. Skipped and failed units are counted
/// separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillStats {
    pub requests_made: usize,
    pub records_stored: usize,
    pub errors: usize,
    pub skipped: usize,
    pub dates_processed: usize,
    pub states_processed: usize,
}

impl BackfillStats {
    pub fn units_attempted(&self) -> usize {
        self.states_processed + self.errors + self.skipped
    }

    /// Turns a run with failed units into `PartialFailure`.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.errors > 0 {
            return Err(Error::PartialFailure {
                failed: self.errors,
                attempted: self.units_attempted(),
            });
        }
        Ok(())
    }
}

pub struct BackfillLoader {
    client: Arc<UpstreamClient>,
    store: Arc<dyn PriceStore>,
    config: BackfillConfig,
}

impl BackfillLoader {
    pub fn new(
        client: Arc<UpstreamClient>,
        store: Arc<dyn PriceStore>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Run a backfill. Only invalid requests return `Err`.
    pub async fn run(&self, request: &BackfillRequest) -> Result<BackfillStats> {
        request.validate()?;

        let states: Vec<&str> = request
            .states
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        info!(
            "Backfill {} to {} for {:?} (skip_existing={})",
            request.start_date, request.end_date, states, request.skip_existing
        );

        let mut stats = BackfillStats::default();
        let mut day = request.start_date;
        while day <= request.end_date {
            for state in &states {
                self.process_unit(state, day, request.skip_existing, &mut stats)
                    .await;
            }
            stats.dates_processed += 1;

            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        if stats.errors > 0 {
            warn!("Backfill finished with {} failed units: {:?}", stats.errors, stats);
        } else {
            info!("Backfill finished: {:?}", stats);
        }
        Ok(stats)
    }

    async fn process_unit(
        &self,
        state: &str,
        day: NaiveDate,
        skip_existing: bool,
        stats: &mut BackfillStats,
    ) {
        if skip_existing {
            match self.store.has_data(state, day) {
                Ok(true) => {
                    debug!("Skipping {} {}: already stored", state, day);
                    stats.skipped += 1;
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Existence probe failed for {} {}: {}", state, day, e);
                    stats.errors += 1;
                    return;
                }
            }
        }

        stats.requests_made += 1;
        let outcome: Result<usize> = async {
            let records = self
                .client
                .fetch_day(state, Some(day), DataSource::Backfill, Utc::now())
                .await?;
            if records.is_empty() {
                return Ok(0);
            }
            self.store.batch_write(&records).await
        }
        .await;

        match outcome {
            Ok(written) => {
                debug!("Backfilled {} records for {} {}", written, state, day);
                stats.records_stored += written;
                stats.states_processed += 1;
            }
            Err(e) => {
                error!("Backfill failed for {} {}: {}", state, day, e);
                stats.errors += 1;
            }
        }

        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::test_support::{client_for, date, record, FixtureProvider, MockPriceStore};

    fn loader(provider: FixtureProvider, store: &MockPriceStore) -> BackfillLoader {
        BackfillLoader::new(
            client_for(Arc::new(provider)),
            Arc::new(store.clone()),
            BackfillConfig {
                request_delay: Duration::ZERO,
            },
        )
    }

    fn request(states: &[&str], start: &str, end: &str, skip_existing: bool) -> BackfillRequest {
        BackfillRequest {
            states: states.iter().map(|s| s.to_string()).collect(),
            start_date: date(start),
            end_date: date(end),
            skip_existing,
        }
    }

    #[tokio::test]
    async fn test_one_failing_state_does_not_stop_the_run() {
        let store = MockPriceStore::new();
        let provider = FixtureProvider::new(vec![("Kolar", "Tomato", 3000), ("Kolar", "Onion", 2000)])
            .failing_state("Punjab");
        let loader = loader(provider, &store);

        let stats = loader
            .run(&request(
                &["Karnataka", "Tamil Nadu", "Punjab"],
                "2025-01-01",
                "2025-01-07",
                true,
            ))
            .await
            .unwrap();

        assert_eq!(stats.errors, 7);
        assert_eq!(stats.dates_processed, 7);
        assert_eq!(stats.states_processed, 14);
        assert_eq!(stats.requests_made, 21);
        assert_eq!(stats.records_stored, 28);

        let stored = store.all();
        for state in ["Karnataka", "Tamil Nadu"] {
            assert_eq!(stored.iter().filter(|r| r.state == state).count(), 14);
        }
        assert!(stored.iter().all(|r| r.state != "Punjab"));
        assert!(stored.iter().all(|r| r.data_source == DataSource::Backfill));

        match stats.ensure_complete() {
            Err(Error::PartialFailure { failed, attempted }) => {
                assert_eq!(failed, 7);
                assert_eq!(attempted, 21);
            }
            other => panic!("expected partial failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_skip_existing_uses_presence_probe() {
        let store = MockPriceStore::with_records(vec![record(
            "Karnataka",
            "2025-01-02",
            "Kolar",
            "Tomato",
            3000,
        )]);
        let provider = FixtureProvider::new(vec![("Kolar", "Tomato", 3000)]);
        let loader = loader(provider, &store);

        let stats = loader
            .run(&request(&["Karnataka"], "2025-01-01", "2025-01-03", true))
            .await
            .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.requests_made, 2);
        assert!(stats.ensure_complete().is_ok());
    }

    #[tokio::test]
    async fn test_no_skip_refetches_and_is_idempotent() {
        let store = MockPriceStore::new();
        let provider = FixtureProvider::new(vec![("Kolar", "Tomato", 3000)]);
        let loader = loader(provider, &store);
        let req = request(&["Karnataka"], "2025-01-01", "2025-01-02", false);

        loader.run(&req).await.unwrap();
        let first = store.ids();
        let stats = loader.run(&req).await.unwrap();

        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.requests_made, 2);
        assert_eq!(store.ids(), first);
    }

    #[tokio::test]
    async fn test_invalid_ranges_are_rejected() {
        let store = MockPriceStore::new();
        let loader = loader(FixtureProvider::new(vec![]), &store);

        let backwards = loader
            .run(&request(&["Karnataka"], "2025-01-07", "2025-01-01", true))
            .await;
        assert!(matches!(backwards, Err(Error::Validation(_))));

        let too_long = loader
            .run(&request(&["Karnataka"], "2024-01-01", "2025-01-31", true))
            .await;
        assert!(matches!(too_long, Err(Error::Validation(_))));

        let no_states = loader.run(&request(&[" "], "2025-01-01", "2025-01-01", true)).await;
        assert!(matches!(no_states, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_store_outage_counts_as_unit_error() {
        let store = MockPriceStore::new();
        store.set_fail(true);
        let loader = loader(FixtureProvider::new(vec![("Kolar", "Tomato", 3000)]), &store);

        let stats = loader
            .run(&request(&["Karnataka"], "2025-01-01", "2025-01-02", false))
            .await
            .unwrap();
        assert_eq!(stats.errors, 2);
        assert!(stats.ensure_complete().is_err());
    }
}
