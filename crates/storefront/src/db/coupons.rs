//! Coupon lookup, application and usage accounting.
//!
//! Usage is counted when a coupon is applied to a cart, not when the order
//! is placed. Removing the coupon from the cart gives the use back.
//!
//! The increment is a single conditional upsert
//! (`usage_count < usage_limit`), so concurrent applies from two sessions
//! cannot push a user past the limit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use threadly_core::pricing::CouponRules;
use threadly_core::{CouponId, DiscountType, UserId};

use super::RepositoryError;
use crate::models::Coupon;

pub(super) const COUPON_COLUMNS: &str = r"
    c.id, c.code, c.description, c.discount_type, c.discount_value, c.min_purchase,
    c.max_discount, c.usage_limit, c.expires_at, c.is_active
";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct CouponRow {
    id: i32,
    code: String,
    description: String,
    discount_type: DiscountType,
    discount_value: Decimal,
    min_purchase: Decimal,
    max_discount: Option<Decimal>,
    usage_limit: i32,
    expires_at: DateTime<Utc>,
    is_active: bool,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: CouponId::new(row.id),
            code: row.code,
            description: row.description,
            rules: CouponRules {
                discount_type: row.discount_type,
                value: row.discount_value,
                min_purchase: row.min_purchase,
                max_discount: row.max_discount,
                usage_limit: row.usage_limit,
                expires_at: row.expires_at,
                is_active: row.is_active,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AvailableRow {
    #[sqlx(flatten)]
    coupon: CouponRow,
    used: i32,
}

/// A coupon offered to a user with the uses they have left.
#[derive(Debug, Clone)]
pub struct AvailableCoupon {
    pub coupon: Coupon,
    pub remaining_uses: i32,
}

/// Why a coupon could not be attached.
#[derive(Debug, thiserror::Error)]
pub enum ApplyCouponError {
    #[error("a coupon is already applied to your cart")]
    AlreadyApplied,
    #[error("you have already used this coupon the maximum number of times")]
    UsageLimitReached,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for ApplyCouponError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

/// Repository for coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a coupon by its (normalized) code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM storefront.coupon c WHERE c.code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// How many times a user has used a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn user_usage(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
    ) -> Result<i32, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        user_usage(&mut *conn, coupon_id, user_id).await
    }

    /// Active, unexpired coupons with the user's remaining uses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn available_for(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<AvailableCoupon>, RepositoryError> {
        let rows = sqlx::query_as::<_, AvailableRow>(&format!(
            r"
            SELECT {COUPON_COLUMNS}, COALESCE(u.usage_count, 0) AS used
            FROM storefront.coupon c
            LEFT JOIN storefront.coupon_usage u ON u.coupon_id = c.id AND u.user_id = $1
            WHERE c.is_active AND c.expires_at > $2
            ORDER BY c.expires_at
            "
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let coupon = Coupon::from(r.coupon);
                let remaining_uses = (coupon.rules.usage_limit - r.used).max(0);
                AvailableCoupon {
                    coupon,
                    remaining_uses,
                }
            })
            .collect())
    }

    /// Attach a coupon to the user's cart and count one use.
    ///
    /// Both writes happen in one transaction; if either is refused nothing
    /// changes.
    ///
    /// # Errors
    ///
    /// Returns `ApplyCouponError::AlreadyApplied` if the cart has a coupon.
    /// Returns `ApplyCouponError::UsageLimitReached` if the user has no uses left.
    pub async fn apply(&self, user_id: UserId, coupon: &Coupon) -> Result<(), ApplyCouponError> {
        let mut tx = self.pool.begin().await?;

        let attached = sqlx::query(
            r"
            INSERT INTO storefront.cart (user_id, coupon_id, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET coupon_id = EXCLUDED.coupon_id, updated_at = NOW()
            WHERE storefront.cart.coupon_id IS NULL
            ",
        )
        .bind(user_id)
        .bind(coupon.id)
        .execute(&mut *tx)
        .await?;

        if attached.rows_affected() == 0 {
            return Err(ApplyCouponError::AlreadyApplied);
        }

        let counted: Option<i32> = sqlx::query_scalar(
            r"
            INSERT INTO storefront.coupon_usage (coupon_id, user_id, usage_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (coupon_id, user_id) DO UPDATE
            SET usage_count = storefront.coupon_usage.usage_count + 1
            WHERE storefront.coupon_usage.usage_count < $3
            RETURNING usage_count
            ",
        )
        .bind(coupon.id)
        .bind(user_id)
        .bind(coupon.rules.usage_limit)
        .fetch_optional(&mut *tx)
        .await?;

        if counted.is_none() {
            return Err(ApplyCouponError::UsageLimitReached);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Detach the cart's coupon and give the use back.
    ///
    /// Returns the coupon that was removed, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId) -> Result<Option<CouponId>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let removed = release_cart_coupon(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(removed)
    }
}

pub(crate) async fn user_usage(
    conn: &mut sqlx::PgConnection,
    coupon_id: CouponId,
    user_id: UserId,
) -> Result<i32, RepositoryError> {
    let used: Option<i32> = sqlx::query_scalar(
        "SELECT usage_count FROM storefront.coupon_usage WHERE coupon_id = $1 AND user_id = $2",
    )
    .bind(coupon_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(used.unwrap_or(0))
}

/// Detach the cart's coupon and decrement its usage, never below zero.
pub(crate) async fn release_cart_coupon(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
) -> Result<Option<CouponId>, RepositoryError> {
    let removed: Option<CouponId> = sqlx::query_scalar(
        r"
        WITH old AS (
            SELECT coupon_id FROM storefront.cart WHERE user_id = $1 FOR UPDATE
        )
        UPDATE storefront.cart c
        SET coupon_id = NULL, updated_at = NOW()
        FROM old
        WHERE c.user_id = $1 AND old.coupon_id IS NOT NULL
        RETURNING old.coupon_id
        ",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(coupon_id) = removed {
        sqlx::query(
            r"
            UPDATE storefront.coupon_usage
            SET usage_count = GREATEST(usage_count - 1, 0)
            WHERE coupon_id = $1 AND user_id = $2
            ",
        )
        .bind(coupon_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(removed)
}
