//! Sales report query.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use threadly_core::{PaymentMethod, PaymentStatus};

use super::RepositoryError;
use super::dashboard::REVENUE_CONDITION;
use crate::models::dashboard::STORE_TIME_ZONE;
use crate::models::report::ReportRow;

#[derive(Debug, sqlx::FromRow)]
struct Row {
    order_number: String,
    created_at: DateTime<Utc>,
    customer_name: String,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    item_count: i64,
    subtotal: Decimal,
    discount: Decimal,
    delivery_charge: Decimal,
    final_amount: Decimal,
}

/// Repository for sales reports.
pub struct ReportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Orders that count as sales, placed between `start` and `end`
    /// inclusive (store dates), oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ReportRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, Row>(&format!(
            r"
            SELECT o.order_number, o.created_at, u.name AS customer_name,
                   o.payment_method, o.payment_status,
                   (SELECT COUNT(*) FROM storefront.order_item i WHERE i.order_id = o.id) AS item_count,
                   o.subtotal, o.discount, o.delivery_charge, o.final_amount
            FROM storefront.customer_order o
            JOIN storefront.user u ON u.id = o.user_id
            WHERE {REVENUE_CONDITION}
              AND (o.created_at AT TIME ZONE '{STORE_TIME_ZONE}')::DATE BETWEEN $1 AND $2
            ORDER BY o.created_at, o.id
            "
        ))
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ReportRow {
                order_number: r.order_number,
                placed_at: r.created_at,
                customer_name: r.customer_name,
                payment_method: r.payment_method,
                payment_status: r.payment_status,
                item_count: r.item_count,
                subtotal: r.subtotal,
                discount: r.discount,
                delivery_charge: r.delivery_charge,
                final_amount: r.final_amount,
            })
            .collect())
    }
}
