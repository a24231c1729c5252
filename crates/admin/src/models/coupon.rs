//! Coupon type for the admin panel.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use threadly_core::pricing::CouponRules;
use threadly_core::{CouponId, DiscountType};

/// A coupon with how often it has been used across all customers.
#[derive(Debug, Clone)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: i32,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub times_used: i64,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    #[must_use]
    pub fn rules(&self) -> CouponRules {
        CouponRules {
            discount_type: self.discount_type,
            value: self.discount_value,
            min_purchase: self.min_purchase,
            max_discount: self.max_discount,
            usage_limit: self.usage_limit,
            expires_at: self.expires_at,
            is_active: self.is_active,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.rules().is_expired(now)
    }

    /// Human-readable value, e.g. `20%` or `₹150.00`.
    #[must_use]
    pub fn value_label(&self) -> String {
        match self.discount_type {
            DiscountType::Percentage => format!("{}%", self.discount_value.normalize()),
            DiscountType::Flat => threadly_core::format_inr(self.discount_value),
        }
    }
}
