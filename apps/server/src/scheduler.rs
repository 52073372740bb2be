//! Background scheduler for the latest-price sync.
//!
//! Each tick syncs the hot states, then purges expired rows.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{info, warn};

use crate::main_lib::AppState;
use mandi_core::prices::SyncStatus;

/// Initial delay before the first sync so startup is not competing with it.
const INITIAL_DELAY_SECS: u64 = 60;

/// Starts the background sync scheduler.
pub fn start_sync_scheduler(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        info!("Price sync scheduler started ({}s interval)", every.as_secs());

        tokio::time::sleep(Duration::from_secs(INITIAL_DELAY_SECS)).await;

        let mut sync_interval = interval(every);
        loop {
            sync_interval.tick().await;
            run_scheduled_sync(&state).await;
        }
    });
}

/// Runs a single scheduled sync followed by a TTL purge.
pub async fn run_scheduled_sync(state: &AppState) {
    info!("Running scheduled price sync for {:?}", state.hot_states);

    let reports = state.latest_sync.run(&state.hot_states).await;
    for report in &reports {
        match report.status {
            SyncStatus::Synced => {}
            SyncStatus::NoData => warn!(
                "No data found for {} after {} attempts",
                report.state, report.attempts
            ),
            SyncStatus::Failed => warn!(
                "Sync failed for {}: {}",
                report.state,
                report.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    match state.latest_sync.purge_expired().await {
        Ok(purged) if purged > 0 => info!("Purged {} expired price records", purged),
        Ok(_) => {}
        Err(e) => warn!("Purging expired records failed: {}", e),
    }
}
