//! Money helpers.
//!
//! All amounts are Indian rupees held as [`Decimal`] with two decimal places.
//! The payment gateway works in paise (1/100 rupee), so conversions live here
//! next to rounding and display formatting.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round an amount to two decimal places, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount for display, e.g. `₹1,249.50`.
///
/// Uses Indian digit grouping (last three digits, then pairs).
#[must_use]
pub fn format_inr(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let grouped = group_indian(whole);
    let sign = if negative { "-" } else { "" };
    format!("{sign}₹{grouped}.{fraction}")
}

fn group_indian(whole: &str) -> String {
    if whole.len() <= 3 {
        return whole.to_string();
    }
    let (head, tail) = whole.split_at(whole.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, right) = rest.split_at(rest.len() - 2);
        groups.push(right);
        rest = left;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();
    format!("{},{tail}", groups.join(","))
}

/// Convert rupees to paise for the payment gateway.
///
/// Returns `None` if the amount is negative or does not fit in an `i64`.
#[must_use]
pub fn to_paise(amount: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;

    if amount.is_sign_negative() {
        return None;
    }
    (round_money(amount) * Decimal::ONE_HUNDRED).trunc().to_i64()
}

/// Convert paise received from the payment gateway to rupees.
#[must_use]
pub fn from_paise(paise: i64) -> Decimal {
    Decimal::new(paise, 2)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(d("10.005")), d("10.01"));
        assert_eq!(round_money(d("10.004")), d("10.00"));
    }

    #[test]
    fn test_format_inr_grouping() {
        assert_eq!(format_inr(d("0")), "₹0.00");
        assert_eq!(format_inr(d("999")), "₹999.00");
        assert_eq!(format_inr(d("1249.5")), "₹1,249.50");
        assert_eq!(format_inr(d("1234567.891")), "₹12,34,567.89");
        assert_eq!(format_inr(d("-50")), "-₹50.00");
    }

    #[test]
    fn test_paise_conversions() {
        assert_eq!(to_paise(d("499.99")), Some(49_999));
        assert_eq!(to_paise(d("-1")), None);
        assert_eq!(from_paise(49_999), d("499.99"));
    }
}
