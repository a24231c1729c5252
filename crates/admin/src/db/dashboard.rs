//! Dashboard queries.
//!
//! Revenue counts an order once its money is in: orders marked `paid` or
//! `partially_refunded`, and cash-on-delivery orders whose every item was
//! delivered.
//! Sales rankings skip items that never sold (unpaid, cancelled or returned).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::dashboard::STORE_TIME_ZONE;
use crate::models::{ChartPeriod, DashboardMetrics, TopSeller};

/// Condition on `storefront.customer_order o` for orders that count as revenue.
pub(crate) const REVENUE_CONDITION: &str = r"
    (o.payment_status IN ('paid', 'partially_refunded')
     OR (o.payment_method = 'cod' AND NOT EXISTS (
         SELECT 1 FROM storefront.order_item ri
         WHERE ri.order_id = o.id AND ri.status <> 'delivered')))
";

const SOLD_ITEM: &str = "i.status NOT IN ('payment_pending', 'cancelled', 'returned')";

/// What the top-ten lists rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    Products,
    Categories,
    Brands,
}

#[derive(Debug, sqlx::FromRow)]
struct MetricsRow {
    total_revenue: Decimal,
    total_orders: i64,
    customers: i64,
    listed_products: i64,
    pending_returns: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ChartRow {
    starts_on: NaiveDate,
    revenue: Decimal,
    orders: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct TopRow {
    name: String,
    units_sold: i64,
    revenue: Decimal,
}

/// Repository for dashboard figures.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn metrics(&self) -> Result<DashboardMetrics, RepositoryError> {
        let row = sqlx::query_as::<_, MetricsRow>(&format!(
            r"
            SELECT
                (SELECT COALESCE(SUM(o.final_amount), 0)
                 FROM storefront.customer_order o
                 WHERE {REVENUE_CONDITION}) AS total_revenue,
                (SELECT COUNT(*) FROM storefront.customer_order
                 WHERE payment_status <> 'failed') AS total_orders,
                (SELECT COUNT(*) FROM storefront.user) AS customers,
                (SELECT COUNT(*) FROM storefront.product WHERE is_listed) AS listed_products,
                (SELECT COUNT(*) FROM storefront.return_request
                 WHERE status = 'requested') AS pending_returns
            "
        ))
        .fetch_one(self.pool)
        .await?;

        Ok(DashboardMetrics {
            total_revenue: row.total_revenue,
            total_orders: row.total_orders,
            customers: row.customers,
            listed_products: row.listed_products,
            pending_returns: row.pending_returns,
        })
    }

    /// Revenue and order counts per bucket since `since`, keyed by the
    /// bucket's first day. Empty buckets are absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_bucket(
        &self,
        period: ChartPeriod,
        since: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal, i64)>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChartRow>(&format!(
            r"
            SELECT date_trunc($1, o.created_at AT TIME ZONE '{STORE_TIME_ZONE}')::DATE AS starts_on,
                   COALESCE(SUM(o.final_amount) FILTER (WHERE {REVENUE_CONDITION}), 0) AS revenue,
                   COUNT(*) AS orders
            FROM storefront.customer_order o
            WHERE o.payment_status <> 'failed'
              AND o.created_at AT TIME ZONE '{STORE_TIME_ZONE}' >= $2::DATE
            GROUP BY 1
            ORDER BY 1
            "
        ))
        .bind(period.trunc_unit())
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.starts_on, r.revenue, r.orders))
            .collect())
    }

    /// Ten best sellers by units sold.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_sellers(&self, ranking: Ranking) -> Result<Vec<TopSeller>, RepositoryError> {
        let (name, join, group) = match ranking {
            Ranking::Products => ("p.name", "", "p.id, p.name"),
            Ranking::Categories => (
                "c.name",
                "JOIN storefront.category c ON c.id = p.category_id",
                "c.id, c.name",
            ),
            Ranking::Brands => (
                "b.name",
                "JOIN storefront.brand b ON b.id = p.brand_id",
                "b.id, b.name",
            ),
        };

        let rows = sqlx::query_as::<_, TopRow>(&format!(
            r"
            SELECT {name} AS name,
                   SUM(i.quantity)::BIGINT AS units_sold,
                   SUM(i.line_total) AS revenue
            FROM storefront.order_item i
            JOIN storefront.product p ON p.id = i.product_id
            {join}
            WHERE {SOLD_ITEM}
            GROUP BY {group}
            ORDER BY units_sold DESC, revenue DESC, {name}
            LIMIT 10
            "
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| TopSeller {
                name: r.name,
                units_sold: r.units_sold,
                revenue: r.revenue,
            })
            .collect())
    }
}
