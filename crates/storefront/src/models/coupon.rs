//! Coupon types.

use threadly_core::CouponId;
use threadly_core::pricing::CouponRules;

/// A coupon as seen by customers.
#[derive(Debug, Clone)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: String,
    pub rules: CouponRules,
}
