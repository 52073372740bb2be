use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One mandi price listing exactly as the upstream provider returns it.
///
/// Prices are in the source's bulk unit (rupees per tonne). They arrive as
/// strings on some pages and numbers on others; unparseable values become `None`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPriceRow {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub commodity: String,
    #[serde(default)]
    pub variety: String,
    #[serde(default)]
    pub grade: String,
    /// Source-native `dd/mm/yyyy` date.
    #[serde(default)]
    pub arrival_date: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub min_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub max_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub modal_price: Option<Decimal>,
}

fn lenient_price<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Decimal::from_str(trimmed).ok()
            }
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_prices_accept_strings_and_numbers() {
        let json = r#"{
            "state": "Karnataka",
            "district": "Kolar",
            "market": "Kolar",
            "commodity": "Tomato",
            "variety": "Local",
            "grade": "FAQ",
            "arrival_date": "15/01/2025",
            "min_price": "2500",
            "max_price": 3500,
            "modal_price": "3000.50"
        }"#;

        let row: RawPriceRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.min_price, Some(dec!(2500)));
        assert_eq!(row.max_price, Some(dec!(3500)));
        assert_eq!(row.modal_price, Some(dec!(3000.50)));
        assert_eq!(row.arrival_date, "15/01/2025");
    }

    #[test]
    fn test_unparseable_or_missing_prices_become_none() {
        let json = r#"{
            "market": "Kolar",
            "commodity": "Tomato",
            "min_price": "NA",
            "max_price": null,
            "modal_price": ""
        }"#;

        let row: RawPriceRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.min_price, None);
        assert_eq!(row.max_price, None);
        assert_eq!(row.modal_price, None);
        assert!(row.state.is_empty());
    }
}
