use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use super::model::{format_date, format_timestamp, DailyMarketPriceDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::daily_market_prices::dsl;
use mandi_core::errors::{Error, Result};
use mandi_core::prices::{
    CommodityPrice, NaturalKey, PriceStore, PriceUpdate, PriceUpdateOutcome, MAX_BATCH_SIZE,
};

pub struct PriceRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl PriceRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn decode_rows(rows: Vec<DailyMarketPriceDB>) -> Result<Vec<CommodityPrice>> {
    rows.into_iter()
        .map(|row| CommodityPrice::try_from(row).map_err(Error::from))
        .collect()
}

/// Collapses duplicate ids so a later record in the batch wins.
fn last_write_wins(records: &[CommodityPrice]) -> Vec<DailyMarketPriceDB> {
    let mut rows: Vec<DailyMarketPriceDB> = Vec::with_capacity(records.len());
    for record in records {
        match rows.iter_mut().find(|row| row.id == record.id) {
            Some(existing) => *existing = DailyMarketPriceDB::from(record),
            None => rows.push(DailyMarketPriceDB::from(record)),
        }
    }
    rows
}

fn same_amount(a: &str, b: &str) -> bool {
    match (Decimal::from_str(a), Decimal::from_str(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

/// Whether two rows for the same id carry the same listing.
fn same_listing(incoming: &DailyMarketPriceDB, stored: &DailyMarketPriceDB) -> bool {
    incoming.district == stored.district
        && incoming.variety == stored.variety
        && incoming.grade == stored.grade
        && incoming.arrival_date == stored.arrival_date
        && incoming.currency == stored.currency
        && same_amount(&incoming.min_price, &stored.min_price)
        && same_amount(&incoming.max_price, &stored.max_price)
        && same_amount(&incoming.modal_price, &stored.modal_price)
}

/// Keeps `version` monotonic across re-ingests. An unchanged listing keeps the
/// stored version and audit fields; a changed one moves to the next version.
fn carry_version(incoming: &mut DailyMarketPriceDB, stored: &DailyMarketPriceDB) {
    if same_listing(incoming, stored) {
        incoming.version = stored.version;
        incoming.last_updated = stored.last_updated.clone();
        incoming.updated_by = stored.updated_by.clone();
    } else {
        incoming.version = stored.version + 1;
    }
}

// =============================================================================
// PriceStore Implementation
// =============================================================================

#[async_trait]
impl PriceStore for PriceRepository {
    // =========================================================================
    // Mutations
    // =========================================================================

    async fn batch_write(&self, records: &[CommodityPrice]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        for chunk in records.chunks(MAX_BATCH_SIZE) {
            let mut rows = last_write_wins(chunk);
            written += self
                .writer
                .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                    let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
                    let stored: HashMap<String, DailyMarketPriceDB> = dsl::daily_market_prices
                        .filter(dsl::id.eq_any(ids))
                        .load::<DailyMarketPriceDB>(conn)
                        .map_err(StorageError::QueryFailed)?
                        .into_iter()
                        .map(|row| (row.id.clone(), row))
                        .collect();
                    for row in rows.iter_mut() {
                        if let Some(current) = stored.get(&row.id) {
                            carry_version(row, current);
                        }
                    }

                    diesel::replace_into(dsl::daily_market_prices)
                        .values(&rows)
                        .execute(conn)
                        .map_err(StorageError::QueryFailed)?;
                    Ok(rows.len())
                })
                .await?;
        }
        debug!("Wrote {} price records", written);
        Ok(written)
    }

    async fn update_price(&self, update: &PriceUpdate) -> Result<PriceUpdateOutcome> {
        let id = update.key.storage_id();
        let new_price = update.new_price;
        let updated_by = update.updated_by.clone();
        let expected_version = update.expected_version;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<PriceUpdateOutcome> {
                let now = Utc::now();
                let row = dsl::daily_market_prices
                    .find(id.as_str())
                    .filter(dsl::expires_at.gt(format_timestamp(now)))
                    .first::<DailyMarketPriceDB>(conn)
                    .optional()
                    .map_err(StorageError::QueryFailed)?
                    .ok_or_else(|| Error::NotFound(id.clone()))?;

                if let Some(expected) = expected_version {
                    if expected != row.version {
                        return Err(Error::Conflict {
                            key: id,
                            expected,
                            actual: row.version,
                        });
                    }
                }

                let old = CommodityPrice::try_from(row)?;
                let version = old.version + 1;
                // The version predicate keeps the swap atomic with the read above.
                let changed = diesel::update(
                    dsl::daily_market_prices
                        .find(id.as_str())
                        .filter(dsl::version.eq(old.version)),
                )
                .set((
                    dsl::modal_price.eq(new_price.to_string()),
                    dsl::version.eq(version),
                    dsl::last_updated.eq(Some(format_timestamp(now))),
                    dsl::updated_by.eq(Some(updated_by)),
                ))
                .execute(conn)
                .map_err(StorageError::QueryFailed)?;

                if changed == 0 {
                    return Err(Error::Conflict {
                        key: id,
                        expected: old.version,
                        actual: version,
                    });
                }

                Ok(PriceUpdateOutcome {
                    old_price: old.modal_price,
                    new_price,
                    version,
                })
            })
            .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = format_timestamp(now);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let deleted =
                    diesel::delete(dsl::daily_market_prices.filter(dsl::expires_at.le(cutoff)))
                        .execute(conn)
                        .map_err(StorageError::QueryFailed)?;
                Ok(deleted)
            })
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn get(
        &self,
        state: &str,
        date: NaiveDate,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommodityPrice>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = dsl::daily_market_prices
            .filter(dsl::state.eq(state))
            .filter(dsl::date.eq(format_date(date)))
            .filter(dsl::expires_at.gt(format_timestamp(Utc::now())))
            .order((dsl::commodity.asc(), dsl::market.asc()))
            .limit(limit as i64)
            .offset(offset as i64)
            .load::<DailyMarketPriceDB>(&mut conn)
            .into_core()?;
        decode_rows(rows)
    }

    fn scan_state(&self, state: &str, limit: usize) -> Result<Vec<CommodityPrice>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = dsl::daily_market_prices
            .filter(dsl::state.eq(state))
            .filter(dsl::expires_at.gt(format_timestamp(Utc::now())))
            .limit(limit as i64)
            .load::<DailyMarketPriceDB>(&mut conn)
            .into_core()?;
        decode_rows(rows)
    }

    /// Newest day first through the `(state, date)` index.
    fn get_recent(&self, state: &str, limit: usize, offset: usize) -> Result<Vec<CommodityPrice>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = dsl::daily_market_prices
            .filter(dsl::state.eq(state))
            .filter(dsl::expires_at.gt(format_timestamp(Utc::now())))
            .order((dsl::date.desc(), dsl::commodity.asc(), dsl::market.asc()))
            .limit(limit as i64)
            .offset(offset as i64)
            .load::<DailyMarketPriceDB>(&mut conn)
            .into_core()?;
        decode_rows(rows)
    }

    fn scan_range(
        &self,
        state: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<CommodityPrice>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = dsl::daily_market_prices
            .filter(dsl::state.eq(state))
            .filter(dsl::expires_at.gt(format_timestamp(Utc::now())))
            .into_boxed();

        if let Some(start) = start_date {
            query = query.filter(dsl::date.ge(format_date(start)));
        }
        if let Some(end) = end_date {
            query = query.filter(dsl::date.le(format_date(end)));
        }

        let rows = query
            .order(dsl::date.desc())
            .limit(limit as i64)
            .load::<DailyMarketPriceDB>(&mut conn)
            .into_core()?;
        decode_rows(rows)
    }

    fn get_by_key(&self, key: &NaturalKey) -> Result<Option<CommodityPrice>> {
        let mut conn = get_connection(&self.pool)?;
        let row = dsl::daily_market_prices
            .find(key.storage_id())
            .filter(dsl::expires_at.gt(format_timestamp(Utc::now())))
            .first::<DailyMarketPriceDB>(&mut conn)
            .optional()
            .into_core()?;
        row.map(|r| CommodityPrice::try_from(r).map_err(Error::from))
            .transpose()
    }

    fn has_data(&self, state: &str, date: NaiveDate) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        let probe = dsl::daily_market_prices
            .select(dsl::id)
            .filter(dsl::state.eq(state))
            .filter(dsl::date.eq(format_date(date)))
            .filter(dsl::expires_at.gt(format_timestamp(Utc::now())))
            .first::<String>(&mut conn)
            .optional()
            .into_core()?;
        Ok(probe.is_some())
    }
}
