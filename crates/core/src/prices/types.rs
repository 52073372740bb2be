//! Strong types for the price system.
//!
//! - `NaturalKey` - (state, date, market, commodity), the identity of one price record
//! - `DataSource` - how a record entered the store, which decides its TTL

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::{BACKFILL_TTL_DAYS, LIVE_TTL_DAYS};

// =============================================================================
// NaturalKey
// =============================================================================

/// Identity of a price record.
///
/// Any two records with the same key are the same record; writing one
/// replaces the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub state: String,
    pub date: NaiveDate,
    pub market: String,
    pub commodity: String,
}

impl NaturalKey {
    pub fn new(
        state: impl Into<String>,
        date: NaiveDate,
        market: impl Into<String>,
        commodity: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            date,
            market: market.into(),
            commodity: commodity.into(),
        }
    }

    /// Storage id: `{state}_{YYYY-MM-DD}_{market}_{commodity}`.
    ///
    /// Spaces and slashes in market and commodity become underscores.
    /// The state is kept verbatim.
    pub fn storage_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.state,
            self.date.format("%Y-%m-%d"),
            sanitize_segment(&self.market),
            sanitize_segment(&self.commodity)
        )
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} on {}",
            self.state, self.market, self.commodity, self.date
        )
    }
}

fn sanitize_segment(value: &str) -> String {
    value.replace(['/', ' '], "_")
}

// =============================================================================
// DataSource
// =============================================================================

/// Provenance tag stored on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Query fallbacks and the scheduled sync.
    Live,
    /// Historical bulk ingestion.
    Backfill,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::Backfill => "backfill",
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            DataSource::Live => Duration::days(LIVE_TTL_DAYS),
            DataSource::Backfill => Duration::days(BACKFILL_TTL_DAYS),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(DataSource::Live),
            "backfill" => Ok(DataSource::Backfill),
            other => Err(format!("unknown data source '{}'", other)),
        }
    }
}
