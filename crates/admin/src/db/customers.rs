//! Customer listing and blocking.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use threadly_core::UserId;

use super::{RepositoryError, like_pattern};
use crate::models::Customer;

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: UserId,
    name: String,
    email: String,
    phone: Option<String>,
    is_blocked: bool,
    signed_in_with_google: bool,
    order_count: i64,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(r: CustomerRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            is_blocked: r.is_blocked,
            signed_in_with_google: r.signed_in_with_google,
            order_count: r.order_count,
            created_at: r.created_at,
        }
    }
}

/// Repository for storefront customers.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A page of customers, newest first, matching `search` against name,
    /// email or phone, and the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Customer>, i64), RepositoryError> {
        let pattern = search
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        let rows = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT u.id, u.name, u.email, u.phone, u.is_blocked,
                   (u.google_id IS NOT NULL) AS signed_in_with_google,
                   (SELECT COUNT(*) FROM storefront.customer_order o WHERE o.user_id = u.id) AS order_count,
                   u.created_at
            FROM storefront.user u
            WHERE $1::TEXT IS NULL OR u.name ILIKE $1 OR u.email ILIKE $1 OR u.phone ILIKE $1
            ORDER BY u.created_at DESC, u.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM storefront.user u
            WHERE $1::TEXT IS NULL OR u.name ILIKE $1 OR u.email ILIKE $1 OR u.phone ILIKE $1
            ",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Block or unblock a customer.
    ///
    /// A blocked customer's sessions are rejected by the storefront on the
    /// next request, so blocking also signs them out.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn set_blocked(&self, id: UserId, blocked: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.user SET is_blocked = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(blocked)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
