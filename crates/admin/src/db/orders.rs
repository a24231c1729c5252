//! Order storage and the admin-side order actions.
//!
//! Every status change appends an `order_item_event` row in the same
//! transaction, and the item and its order are locked (`FOR UPDATE`) before
//! the transition is checked. The storefront locks the same rows, so a
//! customer cancel and an admin ship serialize.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use threadly_core::lifecycle::{self, Actor, TransitionError};
use threadly_core::{
    OrderId, OrderItemId, OrderItemStatus, PaymentMethod, PaymentStatus, ProductSizeId,
    ReturnStatus, UserId,
};

use super::{RepositoryError, like_pattern};
use crate::models::{
    AddressSnapshot, OrderDetail, OrderItem, OrderListItem, ReturnRequest, StatusEntry,
};

/// Why an admin order action was refused.
#[derive(Debug, thiserror::Error)]
pub enum OrderActionError {
    #[error("order item not found")]
    NotFound,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("there is no pending return request for this item")]
    NoPendingReturn,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderActionError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListRow {
    id: OrderId,
    order_number: String,
    customer_name: String,
    customer_email: String,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    final_amount: Decimal,
    item_count: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    customer_name: String,
    customer_email: String,
    shipping_address: Json<AddressSnapshot>,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    subtotal: Decimal,
    discount: Decimal,
    coupon_code: Option<String>,
    delivery_charge: Decimal,
    final_amount: Decimal,
    razorpay_payment_id: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: OrderItemId,
    product_name: String,
    size: String,
    image: Option<String>,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
    status: OrderItemStatus,
    delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    order_item_id: OrderItemId,
    status: OrderItemStatus,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReturnRow {
    order_item_id: OrderItemId,
    reason: String,
    status: ReturnStatus,
    refund_amount: Option<Decimal>,
    admin_note: Option<String>,
    requested_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    order_id: OrderId,
    status: OrderItemStatus,
}

/// An item and its order, locked for update.
#[derive(Debug, sqlx::FromRow)]
struct LockedItem {
    id: OrderItemId,
    order_id: OrderId,
    product_size_id: ProductSizeId,
    quantity: i32,
    line_total: Decimal,
    status: OrderItemStatus,
    user_id: UserId,
    order_number: String,
    subtotal: Decimal,
    discount: Decimal,
    delivery_charge: Decimal,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
}

impl LockedItem {
    fn is_paid(&self) -> bool {
        matches!(
            self.payment_status,
            PaymentStatus::Paid | PaymentStatus::PartiallyRefunded
        )
    }
}

/// Repository for orders as seen from the back office.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A page of orders, newest first, and the total count.
    ///
    /// `status` keeps orders with at least one item in that status. `search`
    /// matches the order number or the customer's email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        status: Option<OrderItemStatus>,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderListItem>, i64), RepositoryError> {
        let pattern = search
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);
        let status = status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, ListRow>(
            r"
            SELECT o.id, o.order_number, u.name AS customer_name, u.email AS customer_email,
                   o.payment_method, o.payment_status, o.final_amount,
                   (SELECT COUNT(*) FROM storefront.order_item i WHERE i.order_id = o.id) AS item_count,
                   o.created_at
            FROM storefront.customer_order o
            JOIN storefront.user u ON u.id = o.user_id
            WHERE ($1::TEXT IS NULL OR EXISTS (
                      SELECT 1 FROM storefront.order_item i
                      WHERE i.order_id = o.id AND i.status::TEXT = $1))
              AND ($2::TEXT IS NULL OR o.order_number ILIKE $2 OR u.email ILIKE $2)
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(status)
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM storefront.customer_order o
            JOIN storefront.user u ON u.id = o.user_id
            WHERE ($1::TEXT IS NULL OR EXISTS (
                      SELECT 1 FROM storefront.order_item i
                      WHERE i.order_id = o.id AND i.status::TEXT = $1))
              AND ($2::TEXT IS NULL OR o.order_number ILIKE $2 OR u.email ILIKE $2)
            ",
        )
        .bind(status)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let status_rows = sqlx::query_as::<_, StatusRow>(
            r"
            SELECT DISTINCT order_id, status
            FROM storefront.order_item
            WHERE order_id = ANY($1)
            ORDER BY order_id, status
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut statuses: HashMap<OrderId, Vec<OrderItemStatus>> = HashMap::new();
        for row in status_rows {
            statuses.entry(row.order_id).or_default().push(row.status);
        }

        let orders = rows
            .into_iter()
            .map(|r| OrderListItem {
                statuses: statuses.remove(&r.id).unwrap_or_default(),
                id: r.id,
                order_number: r.order_number,
                customer_name: r.customer_name,
                customer_email: r.customer_email,
                payment_method: r.payment_method,
                payment_status: r.payment_status,
                final_amount: r.final_amount,
                item_count: r.item_count,
                created_at: r.created_at,
            })
            .collect();

        Ok((orders, total))
    }

    /// An order with its customer, items, histories and return records.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, DetailRow>(
            r"
            SELECT o.id, o.order_number, o.user_id, u.name AS customer_name,
                   u.email AS customer_email, o.shipping_address, o.payment_method,
                   o.payment_status, o.subtotal, o.discount, o.coupon_code,
                   o.delivery_charge, o.final_amount, o.razorpay_payment_id, o.created_at
            FROM storefront.customer_order o
            JOIN storefront.user u ON u.id = o.user_id
            WHERE o.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self.load_items(id).await?;

        Ok(Some(OrderDetail {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            subtotal: row.subtotal,
            discount: row.discount,
            coupon_code: row.coupon_code,
            delivery_charge: row.delivery_charge,
            final_amount: row.final_amount,
            razorpay_payment_id: row.razorpay_payment_id,
            created_at: row.created_at,
            items,
        }))
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT id, product_name, size, image, unit_price, quantity, line_total,
                   status, delivered_at
            FROM storefront.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        let events = sqlx::query_as::<_, EventRow>(
            r"
            SELECT e.order_item_id, e.status, e.note, e.created_at
            FROM storefront.order_item_event e
            JOIN storefront.order_item i ON i.id = e.order_item_id
            WHERE i.order_id = $1
            ORDER BY e.created_at, e.id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        let returns = sqlx::query_as::<_, ReturnRow>(
            r"
            SELECT r.order_item_id, r.reason, r.status, r.refund_amount, r.admin_note,
                   r.requested_at, r.resolved_at
            FROM storefront.return_request r
            JOIN storefront.order_item i ON i.id = r.order_item_id
            WHERE i.order_id = $1
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        let mut history: HashMap<OrderItemId, Vec<StatusEntry>> = HashMap::new();
        for e in events {
            history.entry(e.order_item_id).or_default().push(StatusEntry {
                status: e.status,
                note: e.note,
                created_at: e.created_at,
            });
        }

        let mut return_requests: HashMap<OrderItemId, ReturnRequest> = returns
            .into_iter()
            .map(|r| {
                (
                    r.order_item_id,
                    ReturnRequest {
                        reason: r.reason,
                        status: r.status,
                        refund_amount: r.refund_amount,
                        admin_note: r.admin_note,
                        requested_at: r.requested_at,
                        resolved_at: r.resolved_at,
                    },
                )
            })
            .collect();

        Ok(rows
            .into_iter()
            .map(|r| OrderItem {
                history: history.remove(&r.id).unwrap_or_default(),
                return_request: return_requests.remove(&r.id),
                id: r.id,
                product_name: r.product_name,
                size: r.size,
                image: r.image,
                unit_price: r.unit_price,
                quantity: r.quantity,
                line_total: r.line_total,
                status: r.status,
                delivered_at: r.delivered_at,
            })
            .collect())
    }

    /// Move an item along the shipping path.
    ///
    /// Delivering stamps `delivered_at`, which opens the return window. A
    /// cash-on-delivery order becomes `paid` once every remaining item has
    /// been delivered.
    ///
    /// # Errors
    ///
    /// Returns `OrderActionError::NotFound` if the item does not exist.
    /// Returns `OrderActionError::Transition` if the move is not allowed.
    pub async fn update_item_status(
        &self,
        item_id: OrderItemId,
        to: OrderItemStatus,
    ) -> Result<(), OrderActionError> {
        let mut tx = self.pool.begin().await?;

        let item = lock_item(&mut *tx, item_id)
            .await?
            .ok_or(OrderActionError::NotFound)?;

        // Cancellations and return decisions have their own actions.
        if !lifecycle::admin_progress_options(item.status).contains(&to) {
            return Err(TransitionError {
                from: item.status,
                to,
            }
            .into());
        }

        set_item_status(&mut *tx, item.id, to, None).await?;

        if to == OrderItemStatus::Delivered {
            sqlx::query("UPDATE storefront.order_item SET delivered_at = NOW() WHERE id = $1")
                .bind(item.id)
                .execute(&mut *tx)
                .await?;

            if item.payment_method == PaymentMethod::Cod
                && item.payment_status == PaymentStatus::Pending
            {
                let statuses = order_statuses(&mut *tx, item.order_id).await?;
                if let Some(status) = lifecycle::cod_collection_status(&statuses) {
                    set_payment_status(&mut *tx, item.order_id, status).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Cancel an item that has not been delivered.
    ///
    /// Restocks the size and, for paid orders, credits the refund to the
    /// customer's wallet. Returns the refunded amount.
    ///
    /// # Errors
    ///
    /// Returns `OrderActionError::NotFound` if the item does not exist.
    /// Returns `OrderActionError::Transition` if the item can no longer be cancelled.
    pub async fn cancel_item(&self, item_id: OrderItemId) -> Result<Decimal, OrderActionError> {
        let mut tx = self.pool.begin().await?;

        let item = lock_item(&mut *tx, item_id)
            .await?
            .ok_or(OrderActionError::NotFound)?;

        lifecycle::transition(item.status, OrderItemStatus::Cancelled, Actor::Admin)?;

        set_item_status(
            &mut *tx,
            item.id,
            OrderItemStatus::Cancelled,
            Some("Cancelled by store"),
        )
        .await?;
        restock(&mut *tx, item.product_size_id, item.quantity).await?;

        let mut refund = Decimal::ZERO;
        if item.payment_method.is_prepaid() && item.is_paid() {
            let statuses = order_statuses(&mut *tx, item.order_id).await?;
            let last_active = statuses
                .iter()
                .all(|s| !lifecycle::is_outstanding(*s));

            refund = lifecycle::cancellation_refund(
                item.line_total,
                item.subtotal,
                item.discount,
                item.delivery_charge,
                last_active,
            );

            refund_to_wallet(
                &mut *tx,
                &item,
                refund,
                &format!("Refund for cancelled item in order {}", item.order_number),
            )
            .await?;
        } else if item.payment_method == PaymentMethod::Cod
            && item.payment_status == PaymentStatus::Pending
        {
            // The remaining items may all be delivered already.
            let statuses = order_statuses(&mut *tx, item.order_id).await?;
            if let Some(status) = lifecycle::cod_collection_status(&statuses) {
                set_payment_status(&mut *tx, item.order_id, status).await?;
            }
        }

        tx.commit().await?;
        Ok(refund)
    }

    /// Accept a return.
    ///
    /// The item becomes `returned`, its size is restocked and the refund is
    /// credited to the wallet whatever the payment method. Returns the
    /// refunded amount.
    ///
    /// # Errors
    ///
    /// Returns `OrderActionError::NotFound` if the item does not exist.
    /// Returns `OrderActionError::NoPendingReturn` if no return is awaiting a decision.
    pub async fn approve_return(&self, item_id: OrderItemId) -> Result<Decimal, OrderActionError> {
        let mut tx = self.pool.begin().await?;

        let item = lock_item(&mut *tx, item_id)
            .await?
            .ok_or(OrderActionError::NotFound)?;

        lifecycle::transition(item.status, OrderItemStatus::Returned, Actor::Admin)?;

        let refund = lifecycle::refund_for_item(item.line_total, item.subtotal, item.discount);

        let resolved = sqlx::query(
            r"
            UPDATE storefront.return_request
            SET status = 'approved', refund_amount = $2, resolved_at = NOW()
            WHERE order_item_id = $1 AND status = 'requested'
            ",
        )
        .bind(item.id)
        .bind(refund)
        .execute(&mut *tx)
        .await?;

        if resolved.rows_affected() == 0 {
            return Err(OrderActionError::NoPendingReturn);
        }

        set_item_status(
            &mut *tx,
            item.id,
            OrderItemStatus::Returned,
            Some("Return approved"),
        )
        .await?;
        restock(&mut *tx, item.product_size_id, item.quantity).await?;

        refund_to_wallet(
            &mut *tx,
            &item,
            refund,
            &format!("Refund for returned item in order {}", item.order_number),
        )
        .await?;

        tx.commit().await?;
        Ok(refund)
    }

    /// Refuse a return, keeping the admin's note on the record.
    ///
    /// # Errors
    ///
    /// Returns `OrderActionError::NotFound` if the item does not exist.
    /// Returns `OrderActionError::NoPendingReturn` if no return is awaiting a decision.
    pub async fn reject_return(
        &self,
        item_id: OrderItemId,
        note: &str,
    ) -> Result<(), OrderActionError> {
        let mut tx = self.pool.begin().await?;

        let item = lock_item(&mut *tx, item_id)
            .await?
            .ok_or(OrderActionError::NotFound)?;

        lifecycle::transition(item.status, OrderItemStatus::ReturnRejected, Actor::Admin)?;

        let resolved = sqlx::query(
            r"
            UPDATE storefront.return_request
            SET status = 'rejected', admin_note = $2, resolved_at = NOW()
            WHERE order_item_id = $1 AND status = 'requested'
            ",
        )
        .bind(item.id)
        .bind(note)
        .execute(&mut *tx)
        .await?;

        if resolved.rows_affected() == 0 {
            return Err(OrderActionError::NoPendingReturn);
        }

        set_item_status(
            &mut *tx,
            item.id,
            OrderItemStatus::ReturnRejected,
            Some(note),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn lock_item(
    conn: &mut sqlx::PgConnection,
    item_id: OrderItemId,
) -> Result<Option<LockedItem>, RepositoryError> {
    let item = sqlx::query_as::<_, LockedItem>(
        r"
        SELECT i.id, i.order_id, i.product_size_id, i.quantity, i.line_total, i.status,
               o.user_id, o.order_number, o.subtotal, o.discount, o.delivery_charge,
               o.payment_method, o.payment_status
        FROM storefront.order_item i
        JOIN storefront.customer_order o ON o.id = i.order_id
        WHERE i.id = $1
        FOR UPDATE OF i, o
        ",
    )
    .bind(item_id)
    .fetch_optional(conn)
    .await?;
    Ok(item)
}

async fn order_statuses(
    conn: &mut sqlx::PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItemStatus>, RepositoryError> {
    let statuses =
        sqlx::query_scalar("SELECT status FROM storefront.order_item WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(conn)
            .await?;
    Ok(statuses)
}

async fn restock(
    conn: &mut sqlx::PgConnection,
    product_size_id: ProductSizeId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE storefront.product_size SET stock = stock + $2 WHERE id = $1")
        .bind(product_size_id)
        .bind(quantity)
        .execute(conn)
        .await?;
    Ok(())
}

async fn set_item_status(
    conn: &mut sqlx::PgConnection,
    item_id: OrderItemId,
    status: OrderItemStatus,
    note: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE storefront.order_item SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(item_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO storefront.order_item_event (order_item_id, status, note) VALUES ($1, $2, $3)",
    )
    .bind(item_id)
    .bind(status)
    .bind(note)
    .execute(conn)
    .await?;
    Ok(())
}

async fn set_payment_status(
    conn: &mut sqlx::PgConnection,
    order_id: OrderId,
    status: PaymentStatus,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE storefront.customer_order SET payment_status = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(order_id)
    .bind(status)
    .execute(conn)
    .await?;
    Ok(())
}

/// Credit a refund to the customer's wallet and update the order's payment status.
async fn refund_to_wallet(
    conn: &mut sqlx::PgConnection,
    item: &LockedItem,
    amount: Decimal,
    description: &str,
) -> Result<(), RepositoryError> {
    if amount > Decimal::ZERO {
        sqlx::query(
            r"
            INSERT INTO storefront.wallet_transaction (user_id, kind, amount, description, order_id)
            VALUES ($1, 'credit', $2, $3, $4)
            ",
        )
        .bind(item.user_id)
        .bind(amount)
        .bind(description)
        .bind(item.order_id)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r"
            INSERT INTO storefront.wallet (user_id, balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET balance = storefront.wallet.balance + EXCLUDED.balance, updated_at = NOW()
            ",
        )
        .bind(item.user_id)
        .bind(amount)
        .execute(&mut *conn)
        .await?;

        tracing::info!(
            order_id = %item.order_id,
            user_id = %item.user_id,
            %amount,
            "Refund credited to wallet"
        );
    }

    let statuses = order_statuses(&mut *conn, item.order_id).await?;
    set_payment_status(
        conn,
        item.order_id,
        lifecycle::payment_status_after_item_refund(
            item.payment_method,
            item.payment_status,
            &statuses,
        ),
    )
    .await
}
