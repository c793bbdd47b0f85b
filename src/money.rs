//! Decimal money helpers.
//!
//! All price arithmetic runs on [`rust_decimal::Decimal`] at full precision;
//! rounding happens once, at display time, never mid-computation.

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency display precision.
pub const DISPLAY_DP: u32 = 2;

/// Rounds a monetary amount for display (2 dp, midpoint away from zero).
pub fn round_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DISPLAY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Applies a percentage (e.g. `20` for 20%) to an amount, unrounded.
pub fn percent_of(amount: Decimal, percentage: Decimal) -> Decimal {
    amount * percentage / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn percent_of_keeps_full_precision() {
        assert_eq!(percent_of(dec!(549.97), dec!(20)), dec!(109.994));
    }

    #[test]
    fn display_rounding_is_midpoint_away_from_zero() {
        assert_eq!(round_display(dec!(109.994)), dec!(109.99));
        assert_eq!(round_display(dec!(439.976)), dec!(439.98));
        assert_eq!(round_display(dec!(1.005)), dec!(1.01));
    }

    #[test]
    fn repeated_addition_does_not_drift() {
        let mut sum = Decimal::ZERO;
        for _ in 0..1000 {
            sum += dec!(0.10);
        }
        assert_eq!(sum, dec!(100.00));
    }
}
