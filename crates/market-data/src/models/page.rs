use chrono::NaiveDate;

use super::price_row::RawPriceRow;

/// Parameters for a single upstream page request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// State filter, matched against the provider's state keyword.
    pub state: String,
    /// Optional arrival date filter. `None` asks for whatever the provider has.
    pub date: Option<NaiveDate>,
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(state: impl Into<String>, date: Option<NaiveDate>, offset: usize, limit: usize) -> Self {
        Self {
            state: state.into(),
            date,
            offset,
            limit,
        }
    }
}

/// One page of rows returned by a provider.
#[derive(Clone, Debug, Default)]
pub struct PricePage {
    pub rows: Vec<RawPriceRow>,
    /// False when the page was shorter than the requested limit.
    pub has_more: bool,
}

impl PricePage {
    /// Builds a page and derives `has_more` from the requested limit.
    pub fn from_rows(rows: Vec<RawPriceRow>, limit: usize) -> Self {
        let has_more = limit > 0 && rows.len() >= limit;
        Self { rows, has_more }
    }
}

/// Every row collected for one (state, date) unit of work.
#[derive(Clone, Debug, Default)]
pub struct PageSet {
    pub rows: Vec<RawPriceRow>,
    pub pages_fetched: usize,
    /// True when the page budget stopped the walk before a short page was seen.
    pub truncated: bool,
}
