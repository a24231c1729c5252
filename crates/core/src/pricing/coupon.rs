//! Coupon validation and discount computation.
//!
//! A coupon carries a per-user usage limit. The stored usage count is only
//! ever incremented by a conditional update (`usage_count < usage_limit`), and
//! [`CouponRules::validate`] refuses a coupon once the limit is reached, so a
//! user can never exceed it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DiscountType, round_money};

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("this coupon is not active")]
    Inactive,
    #[error("this coupon has expired")]
    Expired,
    #[error("add items worth {minimum} or more to use this coupon")]
    MinimumNotMet {
        /// Formatted minimum purchase.
        minimum: String,
    },
    #[error("you have already used this coupon the maximum number of times")]
    UsageLimitReached,
}

/// The parts of a coupon that decide whether and how much it discounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRules {
    pub discount_type: DiscountType,
    /// Percent (for [`DiscountType::Percentage`]) or rupees (for [`DiscountType::Flat`]).
    pub value: Decimal,
    /// Cart subtotal required before the coupon applies.
    pub min_purchase: Decimal,
    /// Cap on a percentage discount.
    pub max_discount: Option<Decimal>,
    /// Uses allowed per user.
    pub usage_limit: i32,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl CouponRules {
    /// Check whether a user may apply this coupon to a cart.
    ///
    /// `user_usage` is how many times this user has already used the coupon.
    ///
    /// # Errors
    ///
    /// Returns the first rule the coupon fails.
    pub fn validate(
        &self,
        subtotal: Decimal,
        user_usage: i32,
        now: DateTime<Utc>,
    ) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive);
        }
        if self.is_expired(now) {
            return Err(CouponError::Expired);
        }
        if subtotal < self.min_purchase {
            return Err(CouponError::MinimumNotMet {
                minimum: crate::types::format_inr(self.min_purchase),
            });
        }
        if user_usage >= self.usage_limit {
            return Err(CouponError::UsageLimitReached);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Discount this coupon gives on `subtotal`, never more than the subtotal.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let pct = subtotal * self.value / Decimal::ONE_HUNDRED;
                self.max_discount.map_or(pct, |cap| pct.min(cap))
            }
            DiscountType::Flat => self.value,
        };
        round_money(raw.clamp(Decimal::ZERO, subtotal))
    }

    /// Validate and compute the discount in one step.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] if the coupon cannot be applied.
    pub fn apply(
        &self,
        subtotal: Decimal,
        user_usage: i32,
        now: DateTime<Utc>,
    ) -> Result<Decimal, CouponError> {
        self.validate(subtotal, user_usage, now)?;
        Ok(self.discount_for(subtotal))
    }
}

/// Normalize a coupon code as typed by a customer or admin.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn percent_coupon() -> CouponRules {
        CouponRules {
            discount_type: DiscountType::Percentage,
            value: d("10"),
            min_purchase: d("1000"),
            max_discount: Some(d("500")),
            usage_limit: 2,
            expires_at: Utc::now() + Duration::days(3),
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let coupon = percent_coupon();
        assert_eq!(coupon.apply(d("2400"), 0, Utc::now()).unwrap(), d("240"));
    }

    #[test]
    fn test_percentage_discount_is_capped() {
        let coupon = percent_coupon();
        assert_eq!(coupon.discount_for(d("9000")), d("500"));
    }

    #[test]
    fn test_flat_discount_clamped_to_subtotal() {
        let coupon = CouponRules {
            discount_type: DiscountType::Flat,
            value: d("300"),
            min_purchase: Decimal::ZERO,
            max_discount: None,
            usage_limit: 1,
            expires_at: Utc::now() + Duration::days(1),
            is_active: true,
        };
        assert_eq!(coupon.discount_for(d("1200")), d("300"));
        assert_eq!(coupon.discount_for(d("250")), d("250"));
    }

    #[test]
    fn test_minimum_purchase() {
        let coupon = percent_coupon();
        assert!(matches!(
            coupon.validate(d("999.99"), 0, Utc::now()),
            Err(CouponError::MinimumNotMet { .. })
        ));
    }

    #[test]
    fn test_usage_limit_reached() {
        let coupon = percent_coupon();
        assert!(coupon.validate(d("1500"), 1, Utc::now()).is_ok());
        assert_eq!(
            coupon.validate(d("1500"), 2, Utc::now()),
            Err(CouponError::UsageLimitReached)
        );
    }

    #[test]
    fn test_expired_and_inactive() {
        let mut coupon = percent_coupon();
        let later = coupon.expires_at + Duration::seconds(1);
        assert_eq!(
            coupon.validate(d("1500"), 0, later),
            Err(CouponError::Expired)
        );

        coupon.is_active = false;
        assert_eq!(
            coupon.validate(d("1500"), 0, Utc::now()),
            Err(CouponError::Inactive)
        );
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  summer10 "), "SUMMER10");
    }
}
