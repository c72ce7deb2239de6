//! Currency arithmetic policy.
//!
//! Amounts are `rust_decimal::Decimal` end to end and discounts are settled
//! to [`MONEY_SCALE`] fractional digits, rounding half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

pub const MONEY_SCALE: u32 = 2;

/// Largest amount a `NUMERIC(12, 2)` column holds: 999_999_999_999 cents.
pub const MAX_MONEY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, MONEY_SCALE);

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// True when `amount` is stored without rounding: at most [`MONEY_SCALE`]
/// significant fractional digits and no larger than [`MAX_MONEY`].
pub fn is_storable(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE && amount.abs() <= MAX_MONEY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        let up: Decimal = "2.345".parse().unwrap();
        let down: Decimal = "2.344".parse().unwrap();
        assert_eq!(round_money(up).to_string(), "2.35");
        assert_eq!(round_money(down).to_string(), "2.34");
    }

    #[test]
    fn max_money_is_the_column_limit() {
        assert_eq!(MAX_MONEY.to_string(), "9999999999.99");
    }

    #[test]
    fn storable_amounts_fit_two_decimals_and_the_limit() {
        assert!(is_storable("12.30".parse().unwrap()));
        assert!(is_storable("12.3000".parse().unwrap()));
        assert!(is_storable(MAX_MONEY));
        assert!(!is_storable("12.345".parse().unwrap()));
        assert!(!is_storable("0.001".parse().unwrap()));
        assert!(!is_storable("10000000000".parse().unwrap()));
    }

    #[test]
    fn keeps_whole_amounts_exact() {
        let amount = Decimal::from(140);
        assert_eq!(round_money(amount), amount);
    }
}
