//! Database model for daily market prices.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::StorageError;
use mandi_core::prices::{CommodityPrice, DataSource};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamps are stored as fixed-width UTC text so they compare lexically.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Decode(format!("{} '{}': {}", field, value, e)))
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(value).map_err(|e| StorageError::Decode(format!("{} '{}': {}", field, value, e)))
}

#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::daily_market_prices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DailyMarketPriceDB {
    pub id: String,
    pub state: String,
    pub district: String,
    pub market: String,
    pub commodity: String,
    pub variety: String,
    pub grade: String,
    pub arrival_date: String,
    pub date: String,
    pub min_price: String,
    pub max_price: String,
    pub modal_price: String,
    pub currency: String,
    pub stored_at: String,
    pub expires_at: String,
    pub data_source: String,
    pub version: i32,
    pub last_updated: Option<String>,
    pub updated_by: Option<String>,
}

impl From<&CommodityPrice> for DailyMarketPriceDB {
    fn from(price: &CommodityPrice) -> Self {
        Self {
            id: price.id.clone(),
            state: price.state.clone(),
            district: price.district.clone(),
            market: price.market.clone(),
            commodity: price.commodity.clone(),
            variety: price.variety.clone(),
            grade: price.grade.clone(),
            arrival_date: price.arrival_date.clone(),
            date: format_date(price.date),
            min_price: price.min_price.to_string(),
            max_price: price.max_price.to_string(),
            modal_price: price.modal_price.to_string(),
            currency: price.currency.clone(),
            stored_at: format_timestamp(price.stored_at),
            expires_at: format_timestamp(price.expires_at),
            data_source: price.data_source.as_str().to_string(),
            version: price.version,
            last_updated: price.last_updated.map(format_timestamp),
            updated_by: price.updated_by.clone(),
        }
    }
}

impl TryFrom<DailyMarketPriceDB> for CommodityPrice {
    type Error = StorageError;

    fn try_from(row: DailyMarketPriceDB) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT)
            .map_err(|e| StorageError::Decode(format!("date '{}': {}", row.date, e)))?;
        let data_source = DataSource::from_str(&row.data_source).map_err(StorageError::Decode)?;
        let last_updated = row
            .last_updated
            .as_deref()
            .map(|ts| parse_timestamp("last_updated", ts))
            .transpose()?;

        Ok(CommodityPrice {
            min_price: parse_decimal("min_price", &row.min_price)?,
            max_price: parse_decimal("max_price", &row.max_price)?,
            modal_price: parse_decimal("modal_price", &row.modal_price)?,
            stored_at: parse_timestamp("stored_at", &row.stored_at)?,
            expires_at: parse_timestamp("expires_at", &row.expires_at)?,
            id: row.id,
            state: row.state,
            district: row.district,
            market: row.market,
            commodity: row.commodity,
            variety: row.variety,
            grade: row.grade,
            arrival_date: row.arrival_date,
            date,
            currency: row.currency,
            data_source,
            version: row.version,
            last_updated,
            updated_by: row.updated_by,
        })
    }
}
