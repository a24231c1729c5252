//! Coupon storage.
//!
//! Orders keep the coupon code as text, so deleting a coupon leaves past
//! orders intact. Usage counts cascade and carts drop the coupon.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use threadly_core::{CouponId, DiscountType};

use super::RepositoryError;
use crate::models::Coupon;

/// Validated coupon fields. `code` is already normalized.
#[derive(Debug, Clone)]
pub struct CouponInput {
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: i32,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: CouponId,
    code: String,
    description: String,
    discount_type: DiscountType,
    discount_value: Decimal,
    min_purchase: Decimal,
    max_discount: Option<Decimal>,
    usage_limit: i32,
    expires_at: DateTime<Utc>,
    is_active: bool,
    times_used: i64,
    created_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(r: CouponRow) -> Self {
        Self {
            id: r.id,
            code: r.code,
            description: r.description,
            discount_type: r.discount_type,
            discount_value: r.discount_value,
            min_purchase: r.min_purchase,
            max_discount: r.max_discount,
            usage_limit: r.usage_limit,
            expires_at: r.expires_at,
            is_active: r.is_active,
            times_used: r.times_used,
            created_at: r.created_at,
        }
    }
}

const SELECT_COUPON: &str = r"
    SELECT c.id, c.code, c.description, c.discount_type, c.discount_value,
           c.min_purchase, c.max_discount, c.usage_limit, c.expires_at, c.is_active,
           COALESCE((SELECT SUM(u.usage_count) FROM storefront.coupon_usage u
                     WHERE u.coupon_id = c.id), 0)::BIGINT AS times_used,
           c.created_at
    FROM storefront.coupon c
";

/// Repository for coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "{SELECT_COUPON} ORDER BY c.created_at DESC, c.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!("{SELECT_COUPON} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, input: &CouponInput) -> Result<CouponId, RepositoryError> {
        sqlx::query_scalar(
            r"
            INSERT INTO storefront.coupon
                (code, description, discount_type, discount_value, min_purchase,
                 max_discount, usage_limit, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(&input.code)
        .bind(&input.description)
        .bind(input.discount_type)
        .bind(input.discount_value)
        .bind(input.min_purchase)
        .bind(input.max_discount)
        .bind(input.usage_limit)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "a coupon with this code"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn update(&self, id: CouponId, input: &CouponInput) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.coupon
            SET code = $2, description = $3, discount_type = $4, discount_value = $5,
                min_purchase = $6, max_discount = $7, usage_limit = $8, expires_at = $9,
                is_active = $10, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.code)
        .bind(&input.description)
        .bind(input.discount_type)
        .bind(input.discount_value)
        .bind(input.min_purchase)
        .bind(input.max_discount)
        .bind(input.usage_limit)
        .bind(input.expires_at)
        .bind(input.is_active)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "a coupon with this code"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.coupon WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Deactivate every active coupon that expired at or before `now`.
    /// Returns how many were switched off.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.coupon
            SET is_active = FALSE, updated_at = NOW()
            WHERE is_active AND expires_at <= $1
            ",
        )
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
