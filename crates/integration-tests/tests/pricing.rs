//! Coupon, offer and order total rules shared by the storefront and admin.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use threadly_core::DiscountType;
use threadly_core::pricing::{
    CartLine, CartTotals, CouponError, CouponRules, DeliverySettings, GeoPoint,
    effective_unit_price, max_line_quantity,
};
use threadly_integration_tests::rupees;

fn percent_coupon(value: i64, max: Option<i64>) -> CouponRules {
    CouponRules {
        discount_type: DiscountType::Percentage,
        value: Decimal::from(value),
        min_purchase: Decimal::from(500),
        max_discount: max.map(Decimal::from),
        usage_limit: 2,
        expires_at: Utc::now() + Duration::days(3),
        is_active: true,
    }
}

#[test]
fn test_discount_never_exceeds_subtotal() {
    let flat = CouponRules {
        discount_type: DiscountType::Flat,
        value: Decimal::from(400),
        ..percent_coupon(0, None)
    };
    for paise in [1, 99, 39_999, 50_000, 1_234_567] {
        let subtotal = rupees(paise);
        for rules in [&flat, &percent_coupon(90, None), &percent_coupon(20, Some(150))] {
            let discount = rules.discount_for(subtotal);
            assert!(discount >= Decimal::ZERO);
            assert!(discount <= subtotal, "{discount} > {subtotal}");
        }
    }
}

#[test]
fn test_percentage_discount_is_capped() {
    let rules = percent_coupon(20, Some(150));
    assert_eq!(rules.discount_for(Decimal::from(600)), Decimal::from(120));
    assert_eq!(rules.discount_for(Decimal::from(5000)), Decimal::from(150));
}

#[test]
fn test_coupon_refused_in_rule_order() {
    let now = Utc::now();
    let mut rules = percent_coupon(10, None);

    assert_eq!(
        rules.apply(Decimal::from(499), 0, now),
        Err(CouponError::MinimumNotMet {
            minimum: threadly_core::format_inr(Decimal::from(500)),
        })
    );
    assert_eq!(
        rules.apply(Decimal::from(800), 2, now),
        Err(CouponError::UsageLimitReached)
    );
    assert_eq!(rules.apply(Decimal::from(800), 1, now), Ok(Decimal::from(80)));

    rules.expires_at = now;
    assert_eq!(rules.apply(Decimal::from(800), 0, now), Err(CouponError::Expired));

    rules.is_active = false;
    assert_eq!(rules.apply(Decimal::from(800), 0, now), Err(CouponError::Inactive));
}

#[test]
fn test_best_offer_wins() {
    let price = Decimal::from(2000);
    assert_eq!(effective_unit_price(price, 10, 25), Decimal::from(1500));
    assert_eq!(effective_unit_price(price, 30, 0), Decimal::from(1400));
    assert_eq!(effective_unit_price(price, 0, 0), price);
}

#[test]
fn test_order_total_invariant() {
    let lines = [
        CartLine {
            unit_price: effective_unit_price(rupees(129_900), 15, 0),
            quantity: 2,
        },
        CartLine {
            unit_price: rupees(49_950),
            quantity: max_line_quantity(9),
        },
    ];
    let subtotal = CartTotals::subtotal_of(&lines);
    let discount = percent_coupon(20, Some(300)).discount_for(subtotal);

    let delivery = DeliverySettings {
        base_charge: Decimal::from(40),
        per_km_rate: Decimal::from(5),
        free_delivery_threshold: None,
        store_location: GeoPoint::from_parts(Some(12.9716), Some(77.5946)),
    };
    let charge = delivery.charge_for(
        subtotal - discount,
        GeoPoint::from_parts(Some(12.9352), Some(77.6245)),
    );

    let totals = CartTotals::new(subtotal, discount, charge);
    assert_eq!(
        totals.final_amount,
        totals.subtotal - totals.discount + totals.delivery_charge
    );
    assert_eq!(totals.discount, Decimal::from(300));
    assert!(totals.delivery_charge > Decimal::from(40));
}

#[test]
fn test_free_delivery_threshold_uses_discounted_subtotal() {
    let delivery = DeliverySettings {
        base_charge: Decimal::from(60),
        per_km_rate: Decimal::ZERO,
        free_delivery_threshold: Some(Decimal::from(999)),
        store_location: None,
    };
    assert_eq!(delivery.charge_for(Decimal::from(999), None), Decimal::ZERO);
    assert_eq!(delivery.charge_for(Decimal::from(998), None), Decimal::from(60));
}
