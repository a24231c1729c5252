//! Product and category offers.
//!
//! Admins can put a percentage offer on a product, on its category, or both.
//! The customer always gets the larger of the two; offers never stack.

use rust_decimal::Decimal;

use crate::types::round_money;

/// Highest offer an admin may set.
pub const MAX_OFFER_PERCENT: i32 = 90;

/// Whether an offer percent is within the allowed range.
#[must_use]
pub const fn offer_percent_valid(percent: i32) -> bool {
    percent >= 0 && percent <= MAX_OFFER_PERCENT
}

/// Price a single unit after applying the best available offer.
///
/// Out-of-range percentages are clamped to `0..=MAX_OFFER_PERCENT`.
#[must_use]
pub fn effective_unit_price(price: Decimal, product_offer: i32, category_offer: i32) -> Decimal {
    let best = product_offer.max(category_offer).clamp(0, MAX_OFFER_PERCENT);
    if best == 0 {
        return round_money(price);
    }
    let off = price * Decimal::from(best) / Decimal::ONE_HUNDRED;
    round_money(price - off)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_no_offer_keeps_price() {
        assert_eq!(effective_unit_price(d("799"), 0, 0), d("799"));
    }

    #[test]
    fn test_larger_offer_wins() {
        assert_eq!(effective_unit_price(d("1000"), 10, 25), d("750"));
        assert_eq!(effective_unit_price(d("1000"), 30, 5), d("700"));
    }

    #[test]
    fn test_offer_is_rounded_to_paise() {
        assert_eq!(effective_unit_price(d("999"), 15, 0), d("849.15"));
        assert_eq!(effective_unit_price(d("333.33"), 33, 0), d("223.33"));
    }

    #[test]
    fn test_offer_clamped() {
        assert_eq!(effective_unit_price(d("100"), 150, 0), d("10"));
        assert_eq!(effective_unit_price(d("100"), -5, 0), d("100"));
        assert!(offer_percent_valid(90));
        assert!(!offer_percent_valid(91));
        assert!(!offer_percent_valid(-1));
    }
}
