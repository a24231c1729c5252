//! Order storage and the customer-side order actions.
//!
//! Every status change on an item appends an `order_item_event` row in the
//! same transaction as the change. Item rows are locked (`FOR UPDATE`) before
//! a transition is checked, so a customer cancel and an admin ship cannot
//! both succeed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use threadly_core::lifecycle::{self, Actor, TransitionError};
use threadly_core::pricing::CartTotals;
use threadly_core::{
    OrderId, OrderItemId, OrderItemStatus, PaymentMethod, PaymentStatus, ProductId,
    ProductSizeId, ReturnStatus, UserId,
};

use super::RepositoryError;
use crate::models::{
    AddressSnapshot, Order, OrderItem, OrderSummary, ReturnRequest, StatusEntry,
};

/// One item of an order being placed.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_size_id: ProductSizeId,
    pub product_name: String,
    pub size: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// An order being placed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub shipping_address: AddressSnapshot,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub totals: CartTotals,
    pub coupon_code: Option<String>,
    /// Initial status of every item.
    pub item_status: OrderItemStatus,
    pub items: Vec<NewOrderItem>,
}

/// Identifiers of a freshly inserted order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub order_number: String,
}

/// Payment-related fields of an order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderPayment {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_number: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub final_amount: Decimal,
}

/// Why a customer order action was refused.
#[derive(Debug, thiserror::Error)]
pub enum OrderActionError {
    #[error("order item not found")]
    NotFound,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("the return window for this item has closed")]
    ReturnWindowClosed,
    #[error("a return has already been requested for this item")]
    ReturnExists,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderActionError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    shipping_address: Json<AddressSnapshot>,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    subtotal: Decimal,
    discount: Decimal,
    coupon_code: Option<String>,
    delivery_charge: Decimal,
    final_amount: Decimal,
    razorpay_order_id: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    product_id: i32,
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
    order_item_id: i32,
    status: OrderItemStatus,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReturnRow {
    order_item_id: i32,
    reason: String,
    status: ReturnStatus,
    refund_amount: Option<Decimal>,
    admin_note: Option<String>,
    requested_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PaidOrder {
    user_id: UserId,
    order_number: String,
    subtotal: Decimal,
    discount: Decimal,
    final_amount: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: i32,
    order_number: String,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    final_amount: Decimal,
    item_count: i64,
    created_at: DateTime<Utc>,
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
    delivered_at: Option<DateTime<Utc>>,
    user_id: UserId,
    order_number: String,
    subtotal: Decimal,
    discount: Decimal,
    delivery_charge: Decimal,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A page of the user's orders, newest first, and the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderSummary>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r"
            SELECT o.id, o.order_number, o.payment_method, o.payment_status, o.final_amount,
                   (SELECT COUNT(*) FROM storefront.order_item i WHERE i.order_id = o.id) AS item_count,
                   o.created_at
            FROM storefront.customer_order o
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM storefront.customer_order WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;

        let orders = rows
            .into_iter()
            .map(|r| OrderSummary {
                id: OrderId::new(r.id),
                order_number: r.order_number,
                payment_method: r.payment_method,
                payment_status: r.payment_status,
                final_amount: r.final_amount,
                item_count: r.item_count,
                created_at: r.created_at,
            })
            .collect();

        Ok((orders, total))
    }

    /// A user's order with items, histories and return records.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_number, shipping_address, payment_method, payment_status,
                   subtotal, discount, coupon_code, delivery_charge, final_amount,
                   razorpay_order_id, created_at
            FROM storefront.customer_order
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self.load_items(id).await?;

        Ok(Some(Order {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            subtotal: row.subtotal,
            discount: row.discount,
            coupon_code: row.coupon_code,
            delivery_charge: row.delivery_charge,
            final_amount: row.final_amount,
            razorpay_order_id: row.razorpay_order_id,
            created_at: row.created_at,
            items,
        }))
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, product_id, product_name, size, image, unit_price, quantity,
                   line_total, status, delivered_at
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
            SELECT r.order_item_id, r.reason, r.status, r.refund_amount, r.admin_note, r.requested_at
            FROM storefront.return_request r
            JOIN storefront.order_item i ON i.id = r.order_item_id
            WHERE i.order_id = $1
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        let mut history: HashMap<i32, Vec<StatusEntry>> = HashMap::new();
        for e in events {
            history.entry(e.order_item_id).or_default().push(StatusEntry {
                status: e.status,
                note: e.note,
                created_at: e.created_at,
            });
        }

        let mut return_requests: HashMap<i32, ReturnRequest> = returns
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
                    },
                )
            })
            .collect();

        Ok(rows
            .into_iter()
            .map(|r| OrderItem {
                id: OrderItemId::new(r.id),
                product_id: ProductId::new(r.product_id),
                product_name: r.product_name,
                size: r.size,
                image: r.image,
                unit_price: r.unit_price,
                quantity: r.quantity,
                line_total: r.line_total,
                status: r.status,
                delivered_at: r.delivered_at,
                history: history.remove(&r.id).unwrap_or_default(),
                return_request: return_requests.remove(&r.id),
            })
            .collect())
    }

    /// Payment fields of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn payment(&self, id: OrderId) -> Result<Option<OrderPayment>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderPayment>(
            r"
            SELECT id, user_id, order_number, payment_method, payment_status, final_amount
            FROM storefront.customer_order
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Find the order paid through a gateway order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_razorpay_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<OrderPayment>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderPayment>(
            r"
            SELECT id, user_id, order_number, payment_method, payment_status, final_amount
            FROM storefront.customer_order
            WHERE razorpay_order_id = $1
            ",
        )
        .bind(razorpay_order_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Store the gateway order created for a payment attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn attach_razorpay_order(
        &self,
        id: OrderId,
        razorpay_order_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE storefront.customer_order
            SET razorpay_order_id = $2, payment_status = 'pending', updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(razorpay_order_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Mark an online payment as received and release the items.
    ///
    /// Returns `false` if the order was already paid, so callbacks and
    /// webhooks can both call this.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn confirm_payment(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE storefront.customer_order
            SET payment_status = 'paid', razorpay_payment_id = $2, updated_at = NOW()
            WHERE id = $1 AND payment_status IN ('pending', 'failed')
            ",
        )
        .bind(id)
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        let pending: Vec<OrderItemId> = sqlx::query_scalar(
            r"
            SELECT id FROM storefront.order_item
            WHERE order_id = $1 AND status = 'payment_pending'
            FOR UPDATE
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for item_id in pending {
            lifecycle::transition(
                OrderItemStatus::PaymentPending,
                OrderItemStatus::Placed,
                Actor::System,
            )
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
            set_item_status(
                &mut *tx,
                item_id,
                OrderItemStatus::Placed,
                Some("Payment received"),
            )
            .await?;
        }

        // Items cancelled before the money arrived were refunded nothing.
        let order = sqlx::query_as::<_, PaidOrder>(
            r"
            SELECT user_id, order_number, subtotal, discount, final_amount
            FROM storefront.customer_order
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        let items: Vec<(Decimal, OrderItemStatus)> = sqlx::query_as(
            "SELECT line_total, status FROM storefront.order_item WHERE order_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let refund = lifecycle::late_payment_refund(
            order.final_amount,
            order.subtotal,
            order.discount,
            &items,
        );
        if refund > Decimal::ZERO {
            refund_to_wallet(
                &mut *tx,
                id,
                order.user_id,
                refund,
                &format!("Refund for items cancelled before payment of order {}", order.order_number),
            )
            .await?;
            tracing::info!(order_number = %order.order_number, %refund, "Refunded items cancelled before payment");
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Mark a pending online payment as failed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fail_payment(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.customer_order
            SET payment_status = 'failed', updated_at = NOW()
            WHERE id = $1 AND payment_status = 'pending'
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel one of the user's items.
    ///
    /// Restocks the size and, for paid orders, credits the refund to the
    /// wallet. Returns the refunded amount.
    ///
    /// # Errors
    ///
    /// Returns `OrderActionError::NotFound` if the item is not the user's.
    /// Returns `OrderActionError::Transition` if the item can no longer be cancelled.
    pub async fn cancel_item(
        &self,
        user_id: UserId,
        item_id: OrderItemId,
    ) -> Result<Decimal, OrderActionError> {
        let mut tx = self.pool.begin().await?;

        let item = lock_item(&mut *tx, item_id)
            .await?
            .filter(|i| i.user_id == user_id)
            .ok_or(OrderActionError::NotFound)?;

        lifecycle::transition(item.status, OrderItemStatus::Cancelled, Actor::Customer)?;

        set_item_status(
            &mut *tx,
            item.id,
            OrderItemStatus::Cancelled,
            Some("Cancelled by customer"),
        )
        .await?;
        restock(&mut *tx, item.product_size_id, item.quantity).await?;

        let paid = item.payment_method.is_prepaid()
            && matches!(
                item.payment_status,
                PaymentStatus::Paid | PaymentStatus::PartiallyRefunded
            );

        let mut refund = Decimal::ZERO;
        if paid {
            let others_active: i64 = sqlx::query_scalar(
                r"
                SELECT COUNT(*) FROM storefront.order_item
                WHERE order_id = $1 AND id <> $2 AND status NOT IN ('cancelled', 'returned')
                ",
            )
            .bind(item.order_id)
            .bind(item.id)
            .fetch_one(&mut *tx)
            .await?;

            refund = lifecycle::cancellation_refund(
                item.line_total,
                item.subtotal,
                item.discount,
                item.delivery_charge,
                others_active == 0,
            );

            refund_to_wallet(
                &mut *tx,
                item.order_id,
                item.user_id,
                refund,
                &format!("Refund for cancelled item in order {}", item.order_number),
            )
            .await?;
        } else if item.payment_method == PaymentMethod::Cod
            && item.payment_status == PaymentStatus::Pending
        {
            // The remaining items may all be delivered already.
            let statuses: Vec<OrderItemStatus> = sqlx::query_scalar(
                "SELECT status FROM storefront.order_item WHERE order_id = $1",
            )
            .bind(item.order_id)
            .fetch_all(&mut *tx)
            .await?;
            if let Some(status) = lifecycle::cod_collection_status(&statuses) {
                sqlx::query(
                    "UPDATE storefront.customer_order SET payment_status = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(item.order_id)
                .bind(status)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(refund)
    }

    /// Ask to return a delivered item.
    ///
    /// # Errors
    ///
    /// Returns `OrderActionError::NotFound` if the item is not the user's.
    /// Returns `OrderActionError::ReturnWindowClosed` after the return window.
    /// Returns `OrderActionError::ReturnExists` if a return was already requested.
    pub async fn request_return(
        &self,
        user_id: UserId,
        item_id: OrderItemId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OrderActionError> {
        let mut tx = self.pool.begin().await?;

        let item = lock_item(&mut *tx, item_id)
            .await?
            .filter(|i| i.user_id == user_id)
            .ok_or(OrderActionError::NotFound)?;

        lifecycle::transition(item.status, OrderItemStatus::ReturnRequested, Actor::Customer)?;

        if !item
            .delivered_at
            .is_some_and(|at| lifecycle::return_window_open(at, now))
        {
            return Err(OrderActionError::ReturnWindowClosed);
        }

        sqlx::query(
            "INSERT INTO storefront.return_request (order_item_id, reason) VALUES ($1, $2)",
        )
        .bind(item.id)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(|e| match RepositoryError::from_unique(e, "return request") {
            RepositoryError::Conflict(_) => OrderActionError::ReturnExists,
            other => other.into(),
        })?;

        set_item_status(
            &mut *tx,
            item.id,
            OrderItemStatus::ReturnRequested,
            Some(reason),
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
               i.delivered_at, o.user_id, o.order_number, o.subtotal, o.discount,
               o.delivery_charge, o.payment_method, o.payment_status
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

/// Insert an order, its items and their first history events.
pub(crate) async fn insert_order(
    conn: &mut sqlx::PgConnection,
    order: &NewOrder,
) -> Result<PlacedOrder, RepositoryError> {
    let (id, order_number): (OrderId, String) = sqlx::query_as(
        r"
        INSERT INTO storefront.customer_order
            (order_number, user_id, shipping_address, payment_method, payment_status,
             subtotal, discount, coupon_code, delivery_charge, final_amount)
        VALUES ('TH' || nextval('storefront.order_number_seq'), $1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, order_number
        ",
    )
    .bind(order.user_id)
    .bind(Json(&order.shipping_address))
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(order.totals.subtotal)
    .bind(order.totals.discount)
    .bind(order.coupon_code.as_deref())
    .bind(order.totals.delivery_charge)
    .bind(order.totals.final_amount)
    .fetch_one(&mut *conn)
    .await?;

    for item in &order.items {
        let item_id: OrderItemId = sqlx::query_scalar(
            r"
            INSERT INTO storefront.order_item
                (order_id, product_id, product_size_id, product_name, size, image,
                 unit_price, quantity, line_total, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(id)
        .bind(item.product_id)
        .bind(item.product_size_id)
        .bind(&item.product_name)
        .bind(&item.size)
        .bind(item.image.as_deref())
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.line_total)
        .bind(order.item_status)
        .fetch_one(&mut *conn)
        .await?;

        insert_event(&mut *conn, item_id, order.item_status, Some("Order placed")).await?;
    }

    Ok(PlacedOrder { id, order_number })
}

/// Take stock for a size. Returns `false` if there is not enough.
pub(crate) async fn decrement_stock(
    conn: &mut sqlx::PgConnection,
    product_size_id: ProductSizeId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE storefront.product_size SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
    )
    .bind(product_size_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
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

async fn insert_event(
    conn: &mut sqlx::PgConnection,
    item_id: OrderItemId,
    status: OrderItemStatus,
    note: Option<&str>,
) -> Result<(), RepositoryError> {
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
    insert_event(conn, item_id, status, note).await
}

/// Credit a refund and update the order's payment status.
async fn refund_to_wallet(
    conn: &mut sqlx::PgConnection,
    order_id: OrderId,
    user_id: UserId,
    amount: Decimal,
    description: &str,
) -> Result<(), RepositoryError> {
    if amount > Decimal::ZERO {
        super::wallet::credit(&mut *conn, user_id, amount, description, Some(order_id), None)
            .await?;
    }

    let statuses: Vec<OrderItemStatus> =
        sqlx::query_scalar("SELECT status FROM storefront.order_item WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;

    sqlx::query(
        "UPDATE storefront.customer_order SET payment_status = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(order_id)
    .bind(lifecycle::payment_status_after_refund(&statuses))
    .execute(conn)
    .await?;

    Ok(())
}
