//! Range query pipeline.
//!
//! Stage one (`PriceStore::scan_range`) runs at the store: equality on state,
//! range on date, newest first, bounded by limit. Stage two ([`refine`]) runs
//! in-process: case-insensitive substring match on commodity and market.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::CommodityPrice;

/// Parameters of a range query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFilter {
    pub state: String,
    pub commodity: Option<String>,
    pub market: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: usize,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

/// Keeps records whose commodity and market contain the given fragments.
///
/// `None` or blank fragments match everything.
pub fn refine(
    records: Vec<CommodityPrice>,
    commodity: Option<&str>,
    market: Option<&str>,
) -> Vec<CommodityPrice> {
    let commodity = commodity.filter(|c| !c.trim().is_empty());
    let market = market.filter(|m| !m.trim().is_empty());

    records
        .into_iter()
        .filter(|r| commodity.map_or(true, |c| contains_ignore_case(&r.commodity, c)))
        .filter(|r| market.map_or(true, |m| contains_ignore_case(&r.market, m)))
        .collect()
}

/// Newest first; ties ordered by commodity then market for stable output.
pub fn sort_by_date_desc(records: &mut [CommodityPrice]) {
    records.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.commodity.cmp(&b.commodity))
            .then_with(|| a.market.cmp(&b.market))
    });
}

/// Point query order: commodity, then market.
pub fn sort_by_commodity_market(records: &mut [CommodityPrice]) {
    records.sort_by(|a, b| {
        a.commodity
            .cmp(&b.commodity)
            .then_with(|| a.market.cmp(&b.market))
    });
}
