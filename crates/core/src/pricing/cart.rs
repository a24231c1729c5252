//! Cart totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::round_money;

/// Most units of one product size a customer may hold in the cart.
pub const MAX_QUANTITY_PER_LINE: i32 = 5;

/// Largest quantity allowed for a line given the size's stock.
#[must_use]
pub fn max_line_quantity(stock: i32) -> i32 {
    stock.clamp(0, MAX_QUANTITY_PER_LINE)
}

/// Units to add for an "add to cart" request. Missing or non-positive means one.
#[must_use]
pub fn requested_quantity(raw: Option<i32>) -> i32 {
    raw.unwrap_or(1).clamp(1, MAX_QUANTITY_PER_LINE)
}

/// Quantity to store when a customer edits a line, or `None` when the size
/// has no stock left to hold.
#[must_use]
pub fn edited_line_quantity(requested: i32, stock: i32) -> Option<i32> {
    let max = max_line_quantity(stock);
    (max > 0).then(|| requested.clamp(1, max))
}

/// One priced line of a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    /// Price per unit after offers.
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_money(self.unit_price * Decimal::from(self.quantity.max(0)))
    }
}

/// Totals for a cart at checkout.
///
/// `final_amount == subtotal - discount + delivery_charge` holds for every
/// value produced by [`CartTotals::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub delivery_charge: Decimal,
    pub final_amount: Decimal,
}

impl CartTotals {
    /// Build totals, clamping the discount to `0..=subtotal`.
    #[must_use]
    pub fn new(subtotal: Decimal, discount: Decimal, delivery_charge: Decimal) -> Self {
        let subtotal = round_money(subtotal.max(Decimal::ZERO));
        let discount = round_money(discount.clamp(Decimal::ZERO, subtotal));
        let delivery_charge = round_money(delivery_charge.max(Decimal::ZERO));
        Self {
            subtotal,
            discount,
            delivery_charge,
            final_amount: subtotal - discount + delivery_charge,
        }
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal_of(lines: &[CartLine]) -> Decimal {
        lines.iter().map(CartLine::line_total).sum()
    }

    /// Subtotal after the coupon, used for delivery thresholds.
    #[must_use]
    pub fn discounted_subtotal(&self) -> Decimal {
        self.subtotal - self.discount
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_subtotal_sums_lines() {
        let lines = [
            CartLine {
                unit_price: d("499.50"),
                quantity: 2,
            },
            CartLine {
                unit_price: d("1299"),
                quantity: 1,
            },
        ];
        assert_eq!(CartTotals::subtotal_of(&lines), d("2298"));
    }

    #[test]
    fn test_final_amount_identity() {
        let totals = CartTotals::new(d("2298"), d("229.80"), d("60"));
        assert_eq!(totals.final_amount, d("2128.20"));
        assert_eq!(
            totals.final_amount,
            totals.subtotal - totals.discount + totals.delivery_charge
        );
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let totals = CartTotals::new(d("300"), d("500"), d("40"));
        assert_eq!(totals.discount, d("300"));
        assert_eq!(totals.final_amount, d("40"));

        let negative = CartTotals::new(d("300"), d("-10"), Decimal::ZERO);
        assert_eq!(negative.discount, Decimal::ZERO);
    }

    #[test]
    fn test_max_line_quantity() {
        assert_eq!(max_line_quantity(0), 0);
        assert_eq!(max_line_quantity(3), 3);
        assert_eq!(max_line_quantity(40), MAX_QUANTITY_PER_LINE);
    }

    #[test]
    fn test_requested_quantity_is_bounded() {
        assert_eq!(requested_quantity(None), 1);
        assert_eq!(requested_quantity(Some(-4)), 1);
        assert_eq!(requested_quantity(Some(3)), 3);
        assert_eq!(requested_quantity(Some(i32::MAX)), MAX_QUANTITY_PER_LINE);
        // Adding to a full line cannot overflow.
        assert!(MAX_QUANTITY_PER_LINE.checked_add(requested_quantity(Some(i32::MAX))).is_some());
    }

    #[test]
    fn test_edited_line_quantity() {
        assert_eq!(edited_line_quantity(3, 10), Some(3));
        assert_eq!(edited_line_quantity(9, 2), Some(2));
        assert_eq!(edited_line_quantity(i32::MAX, 40), Some(MAX_QUANTITY_PER_LINE));
        assert_eq!(edited_line_quantity(2, 0), None);
        assert_eq!(edited_line_quantity(2, -3), None);
    }
}
