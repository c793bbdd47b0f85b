//! Cart aggregation arithmetic: subtotal, discount, shipping and total.
//!
//! All computation stays at full [`Decimal`] precision; use
//! [`CartTotals::display`] to round for presentation.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::money;

/// Shipping rule: free at or above the threshold, flat fee below it.
#[derive(Debug, Clone, Copy)]
pub struct ShippingPolicy {
    pub free_threshold: Decimal,
    pub flat_fee: Decimal,
}

impl ShippingPolicy {
    pub fn fee_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal >= self.free_threshold {
            Decimal::ZERO
        } else if subtotal > Decimal::ZERO {
            self.flat_fee
        } else {
            Decimal::ZERO
        }
    }
}

/// One priced cart line.
#[derive(Debug, Clone, Copy)]
pub struct LineAmount {
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl LineAmount {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Aggregated cart amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl CartTotals {
    /// Copy with every field rounded to currency display precision.
    pub fn display(&self) -> CartTotals {
        CartTotals {
            subtotal: money::round_display(self.subtotal),
            discount_amount: money::round_display(self.discount_amount),
            shipping: money::round_display(self.shipping),
            total: money::round_display(self.total),
        }
    }
}

/// Aggregates cart lines into subtotal, discount, shipping and total.
///
/// The discount is `percentage` of the subtotal, capped so it never exceeds
/// the subtotal; the total is floored at zero before shipping is added.
pub fn compute_totals(
    lines: &[LineAmount],
    discount_percentage: Option<Decimal>,
    shipping: ShippingPolicy,
) -> CartTotals {
    let subtotal: Decimal = lines.iter().map(LineAmount::line_total).sum();

    let discount_amount = discount_percentage
        .map(|p| money::percent_of(subtotal, p).min(subtotal))
        .unwrap_or(Decimal::ZERO);

    let shipping = shipping.fee_for(subtotal);
    let total = (subtotal - discount_amount).max(Decimal::ZERO) + shipping;

    CartTotals {
        subtotal,
        discount_amount,
        shipping,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const POLICY: ShippingPolicy = ShippingPolicy {
        free_threshold: dec!(100),
        flat_fee: dec!(10),
    };

    fn line(unit_price: Decimal, quantity: i32) -> LineAmount {
        LineAmount {
            unit_price,
            quantity,
        }
    }

    #[test]
    fn subtotal_is_sum_of_line_totals() {
        let totals = compute_totals(&[line(dec!(249.99), 1), line(dec!(149.99), 2)], None, POLICY);
        assert_eq!(totals.subtotal, dec!(549.97));
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dec!(549.97));
    }

    #[test]
    fn twenty_percent_off_two_line_cart() {
        // 249.99 + 2 x 149.99 = 549.97; 20% off; free shipping over 100.
        let totals = compute_totals(
            &[line(dec!(249.99), 1), line(dec!(149.99), 2)],
            Some(dec!(20)),
            POLICY,
        );
        assert_eq!(totals.subtotal, dec!(549.97));
        assert_eq!(totals.discount_amount, dec!(109.994));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dec!(439.976));

        let display = totals.display();
        assert_eq!(display.discount_amount, dec!(109.99));
        assert_eq!(display.total, dec!(439.98));
    }

    #[test]
    fn free_shipping_boundary() {
        let at = compute_totals(&[line(dec!(100.00), 1)], None, POLICY);
        assert_eq!(at.shipping, Decimal::ZERO);

        let below = compute_totals(&[line(dec!(99.99), 1)], None, POLICY);
        assert_eq!(below.shipping, dec!(10));
        assert_eq!(below.total, dec!(109.99));
    }

    #[test]
    fn empty_cart_ships_nothing() {
        let totals = compute_totals(&[], None, POLICY);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn discount_never_exceeds_subtotal() {
        let totals = compute_totals(&[line(dec!(40.00), 1)], Some(dec!(250)), POLICY);
        assert_eq!(totals.discount_amount, dec!(40.00));
        // Floored at zero before shipping.
        assert_eq!(totals.total, dec!(10));
    }

    #[test]
    fn total_invariant_holds() {
        let cases = [
            (vec![line(dec!(12.34), 3)], Some(dec!(15))),
            (vec![line(dec!(0.01), 1)], Some(dec!(100))),
            (vec![line(dec!(75.50), 2), line(dec!(3.25), 4)], None),
        ];
        for (lines, pct) in cases {
            let t = compute_totals(&lines, pct, POLICY);
            assert!(t.discount_amount <= t.subtotal);
            assert_eq!(
                t.total,
                (t.subtotal - t.discount_amount).max(Decimal::ZERO) + t.shipping
            );
        }
    }

    #[test]
    fn applying_the_same_discount_twice_is_idempotent() {
        let lines = [line(dec!(249.99), 1), line(dec!(149.99), 2)];
        let first = compute_totals(&lines, Some(dec!(20)), POLICY);
        let second = compute_totals(&lines, Some(dec!(20)), POLICY);
        assert_eq!(first, second);
    }
}
