//! Domain models for commodity price records.

use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mandi_market_data::{parse_arrival_date, RawPriceRow};

use super::constants::DEFAULT_CURRENCY;
use super::types::{DataSource, NaturalKey};

/// One daily price listing for a commodity in a market.
///
/// Prices are in the source's bulk unit (rupees per tonne).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityPrice {
    /// Storage id derived from the natural key.
    pub id: String,
    pub state: String,
    pub district: String,
    pub market: String,
    pub commodity: String,
    pub variety: String,
    pub grade: String,
    /// Source-native `dd/mm/yyyy` string.
    pub arrival_date: String,
    /// Calendar date used in the natural key.
    pub date: NaiveDate,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub modal_price: Decimal,
    pub currency: String,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub data_source: DataSource,
    pub version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl CommodityPrice {
    /// Converts an upstream row into a record ready to persist.
    ///
    /// The key date is `date` when the fetch asked for a specific day, else the
    /// row's own arrival date. Rows missing a market, a commodity, a usable date
    /// or a modal price are dropped. Missing min/max fall back to the modal price.
    pub fn from_raw(
        row: RawPriceRow,
        date: Option<NaiveDate>,
        source: DataSource,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let market = row.market.trim().to_string();
        let commodity = row.commodity.trim().to_string();
        if market.is_empty() || commodity.is_empty() {
            debug!("Dropping row without market or commodity: {:?}", row);
            return None;
        }

        let date = date.or_else(|| parse_arrival_date(&row.arrival_date))?;
        let modal_price = match row.modal_price {
            Some(price) => price,
            None => {
                debug!("Dropping {} / {} without modal price", market, commodity);
                return None;
            }
        };

        let key = NaturalKey::new(row.state.clone(), date, market.clone(), commodity.clone());
        Some(Self {
            id: key.storage_id(),
            state: row.state,
            district: row.district,
            market,
            commodity,
            variety: row.variety,
            grade: row.grade,
            arrival_date: row.arrival_date,
            date,
            min_price: row.min_price.unwrap_or(modal_price),
            max_price: row.max_price.unwrap_or(modal_price),
            modal_price,
            currency: DEFAULT_CURRENCY.to_string(),
            stored_at: now,
            expires_at: now + source.ttl(),
            data_source: source,
            version: 1,
            last_updated: None,
            updated_by: None,
        })
    }

    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(
            self.state.clone(),
            self.date,
            self.market.clone(),
            self.commodity.clone(),
        )
    }

    /// Whether `min_price <= modal_price <= max_price` holds.
    ///
    /// Upstream data does not guarantee it and the record is never repaired.
    pub fn is_price_ordered(&self) -> bool {
        self.min_price <= self.modal_price && self.modal_price <= self.max_price
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Direct modal price change addressed by natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub key: NaturalKey,
    /// New modal price, per tonne.
    pub new_price: Decimal,
    pub updated_by: String,
    /// When set, the write only applies if the stored version still matches.
    pub expected_version: Option<i32>,
}

/// Result of a successful price mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdateOutcome {
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub version: i32,
}
