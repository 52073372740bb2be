//! Market data models
//!
//! - `price_row` - Raw upstream listing (RawPriceRow)
//! - `page` - Page request/response shapes (PageRequest, PricePage, PageSet)

mod page;
mod price_row;

pub use page::{PageRequest, PageSet, PricePage};
pub use price_row::RawPriceRow;

/// Formats a date the way the upstream provider expects it (`dd/mm/yyyy`).
pub fn format_arrival_date(date: chrono::NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Parses a provider `dd/mm/yyyy` date.
pub fn parse_arrival_date(value: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value.trim(), "%d/%m/%Y").ok()
}
