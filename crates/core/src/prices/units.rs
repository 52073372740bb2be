//! Conversion between the source bulk unit (per tonne) and the display unit (per kg).

use rust_decimal::Decimal;

use super::constants::KG_PER_TONNE;

pub fn per_tonne_to_per_kg(per_tonne: Decimal) -> Decimal {
    per_tonne / Decimal::from(KG_PER_TONNE)
}

pub fn per_kg_to_per_tonne(per_kg: Decimal) -> Decimal {
    per_kg * Decimal::from(KG_PER_TONNE)
}

/// Rounds a display amount to two decimal places (banker's rounding).
pub fn round_display(value: Decimal) -> Decimal {
    value.round_dp(2)
}
