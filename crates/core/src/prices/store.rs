//! Price storage traits.
//!
//! This module defines the storage interface for commodity price records.
//! Implementations hide expired rows from every read; `purge_expired`
//! removes them physically.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::filter::{refine, sort_by_date_desc, PriceFilter};
use super::model::{CommodityPrice, PriceUpdate, PriceUpdateOutcome};
use super::types::NaturalKey;
use crate::errors::Result;

// =============================================================================
// Price Store
// =============================================================================

/// Storage interface for price records.
///
/// # Method Naming Convention
///
/// - `scan_*` - Raw store-side selection, minimal ordering guarantees
/// - `get*` / `filter` - Query results in their documented order
#[async_trait]
pub trait PriceStore: Send + Sync {
    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create-or-overwrite by natural key.
    ///
    /// Records are written in chunks of at most `MAX_BATCH_SIZE`. Each chunk is
    /// atomic; a failure leaves earlier chunks committed. Within a chunk a later
    /// duplicate key wins.
    ///
    /// # Returns
    ///
    /// The number of records written
    async fn batch_write(&self, records: &[CommodityPrice]) -> Result<usize>;

    /// Overwrites the modal price of an existing record.
    ///
    /// Fails with `NotFound` when the key is absent (nothing is created), and
    /// with `Conflict` when `expected_version` is set and stale.
    async fn update_price(&self, update: &PriceUpdate) -> Result<PriceUpdateOutcome>;

    /// Deletes records whose TTL has passed.
    ///
    /// # Returns
    ///
    /// The number of records deleted
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Records for one state and day, sorted by commodity then market.
    fn get(
        &self,
        state: &str,
        date: NaiveDate,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommodityPrice>>;

    /// Up to `limit` records for a state in no particular order.
    fn scan_state(&self, state: &str, limit: usize) -> Result<Vec<CommodityPrice>>;

    /// Records for a state within an optional date range, newest first, bounded by `limit`.
    fn scan_range(
        &self,
        state: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<CommodityPrice>>;

    fn get_by_key(&self, key: &NaturalKey) -> Result<Option<CommodityPrice>>;

    /// Whether at least one record exists for the state and day.
    fn has_data(&self, state: &str, date: NaiveDate) -> Result<bool>;

    // =========================================================================
    // Derived Queries
    // =========================================================================

    /// Best-effort latest records when no date is given.
    ///
    /// The default reads `3 * (limit + offset)` records for the state, then
    /// sorts by date descending before paging. Stores with a `(state, date)`
    /// index should override it with an ordered query.
    fn get_recent(&self, state: &str, limit: usize, offset: usize) -> Result<Vec<CommodityPrice>> {
        let mut records = self.scan_state(state, 3 * (limit + offset))?;
        sort_by_date_desc(&mut records);
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    /// Range query: `scan_range`, then `refine`, then newest first.
    fn filter(&self, filter: &PriceFilter) -> Result<Vec<CommodityPrice>> {
        let scanned = self.scan_range(
            &filter.state,
            filter.start_date,
            filter.end_date,
            filter.limit,
        )?;
        let mut refined = refine(
            scanned,
            filter.commodity.as_deref(),
            filter.market.as_deref(),
        );
        sort_by_date_desc(&mut refined);
        Ok(refined)
    }
}
