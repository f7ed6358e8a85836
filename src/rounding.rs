//! Rounding
//!
//! Shared monetary rounding and percentage arithmetic used by every derived
//! field computation. All amounts round half-away-from-zero at the configured
//! number of decimal places.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{Money, iso::Currency};

/// Round a monetary amount to the given number of decimal places.
pub fn round_amount(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a percent rate (`0..=100`) into a multiplicative ratio.
pub fn percent_ratio(rate: Decimal) -> Percentage {
    Percentage::from(rate / Decimal::ONE_HUNDRED)
}

/// Apply a percent rate (`0..=100`) to an amount, unrounded.
pub fn percent_of(rate: Decimal, amount: Decimal) -> Decimal {
    percent_ratio(rate) * amount
}

/// Format an amount as a money string in the given display currency.
pub fn display_amount(value: Decimal, currency: &'static Currency) -> String {
    Money::from_decimal(value, currency).to_string()
}

#[cfg(test)]
mod tests {
    use rusty_money::iso;

    use super::*;

    #[test]
    fn round_amount_half_away_from_zero() {
        assert_eq!(round_amount(Decimal::new(12345, 3), 2), Decimal::new(1235, 2));
        assert_eq!(round_amount(Decimal::new(-12345, 3), 2), Decimal::new(-1235, 2));
        assert_eq!(round_amount(Decimal::new(125, 2), 1), Decimal::new(13, 1));
    }

    #[test]
    fn percent_of_computes_rate_share() {
        assert_eq!(
            percent_of(Decimal::from(21), Decimal::from(100)),
            Decimal::from(21)
        );
        assert_eq!(
            percent_of(Decimal::from(50), Decimal::new(1050, 2)),
            Decimal::new(525, 2)
        );
    }

    #[test]
    fn display_amount_formats_currency() {
        let formatted = display_amount(Decimal::new(1050, 2), iso::MYR);

        assert!(formatted.contains("10.50"), "got {formatted}");
    }
}
