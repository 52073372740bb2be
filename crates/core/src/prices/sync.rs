//! Scheduled latest-day sync.
//!
//! For each state, walks back from today until the upstream provider has
//! listings, and persists that day with the live TTL. This is the only place
//! upstream failures are retried: errors classified `WithBackoff` are retried
//! on the same day with exponential backoff, terminal errors move on to the
//! previous day.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::client::UpstreamClient;
use super::store::PriceStore;
use super::types::DataSource;
use crate::errors::Result;

/// Sync configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How many days before today to try when today has no listings.
    pub max_days_back: u32,
    /// Attempts per day for retryable failures, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_days_back: 30,
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// A day with listings was found and stored.
    Synced,
    /// Every day in the walk came back empty.
    NoData,
    /// No day was stored and at least one attempt failed.
    Failed,
}

/// Outcome of syncing one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub state: String,
    pub status: SyncStatus,
    pub date: Option<NaiveDate>,
    pub records_stored: usize,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct LatestSync {
    client: Arc<UpstreamClient>,
    store: Arc<dyn PriceStore>,
    config: SyncConfig,
}

impl LatestSync {
    pub fn new(client: Arc<UpstreamClient>, store: Arc<dyn PriceStore>, config: SyncConfig) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Sync every state in order. Never fails as a whole.
    pub async fn run(&self, states: &[String]) -> Vec<SyncReport> {
        let today = Utc::now().date_naive();
        let mut reports = Vec::with_capacity(states.len());
        for state in states {
            let report = self.sync_state(state, today).await;
            info!(
                "Sync {}: {:?} date={:?} records={} attempts={}",
                report.state, report.status, report.date, report.records_stored, report.attempts
            );
            reports.push(report);
        }
        reports
    }

    async fn sync_state(&self, state: &str, today: NaiveDate) -> SyncReport {
        let mut attempts = 0u32;
        let mut last_error: Option<String> = None;

        for back in 0..=self.config.max_days_back {
            let day = today - chrono::Duration::days(i64::from(back));
            let mut backoff = self.config.initial_backoff;

            for attempt in 1..=self.config.max_attempts.max(1) {
                attempts += 1;
                match self.sync_day(state, day).await {
                    Ok(0) => {
                        debug!("No listings for {} on {}", state, day);
                        break;
                    }
                    Ok(stored) => {
                        return SyncReport {
                            state: state.to_string(),
                            status: SyncStatus::Synced,
                            date: Some(day),
                            records_stored: stored,
                            attempts,
                            error: None,
                        };
                    }
                    Err(e) => {
                        let retryable = e.retry_class().is_retryable();
                        warn!(
                            "Sync attempt {} for {} on {} failed (retryable={}): {}",
                            attempt, state, day, retryable, e
                        );
                        last_error = Some(e.to_string());
                        if !retryable || attempt == self.config.max_attempts {
                            break;
                        }
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(self.config.max_backoff);
                    }
                }
            }
        }

        SyncReport {
            state: state.to_string(),
            status: if last_error.is_some() {
                SyncStatus::Failed
            } else {
                SyncStatus::NoData
            },
            date: None,
            records_stored: 0,
            attempts,
            error: last_error,
        }
    }

    async fn sync_day(&self, state: &str, day: NaiveDate) -> Result<usize> {
        let records = self
            .client
            .fetch_day(state, Some(day), DataSource::Live, Utc::now())
            .await?;
        if records.is_empty() {
            return Ok(0);
        }
        self.store.batch_write(&records).await
    }

    /// Remove expired records from the store.
    pub async fn purge_expired(&self) -> Result<usize> {
        let purged = self.store.purge_expired(Utc::now()).await?;
        if purged > 0 {
            info!("Purged {} expired price records", purged);
        }
        Ok(purged)
    }
}
