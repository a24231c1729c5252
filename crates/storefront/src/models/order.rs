//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use threadly_core::lifecycle::{self, Actor};
use threadly_core::{
    OrderId, OrderItemId, OrderItemStatus, PaymentMethod, PaymentStatus, ProductId, ReturnStatus,
};

use super::AddressSnapshot;

/// One entry in an item's status history.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub status: OrderItemStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A return request attached to an item.
#[derive(Debug, Clone)]
pub struct ReturnRequest {
    pub reason: String,
    pub status: ReturnStatus,
    pub refund_amount: Option<Decimal>,
    pub admin_note: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// An ordered item.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub size: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub status: OrderItemStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub history: Vec<StatusEntry>,
    pub return_request: Option<ReturnRequest>,
}

impl OrderItem {
    #[must_use]
    pub fn can_cancel(&self) -> bool {
        lifecycle::transition(self.status, OrderItemStatus::Cancelled, Actor::Customer).is_ok()
    }

    #[must_use]
    pub fn can_return(&self, now: &DateTime<Utc>) -> bool {
        self.status == OrderItemStatus::Delivered
            && self.return_request.is_none()
            && self
                .delivered_at
                .is_some_and(|at| lifecycle::return_window_open(at, *now))
    }
}

/// A full order.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub shipping_address: AddressSnapshot,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub coupon_code: Option<String>,
    pub delivery_charge: Decimal,
    pub final_amount: Decimal,
    pub razorpay_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Whether the customer can (re)try an online payment.
    #[must_use]
    pub fn awaiting_payment(&self) -> bool {
        self.payment_method == PaymentMethod::Razorpay
            && matches!(
                self.payment_status,
                PaymentStatus::Pending | PaymentStatus::Failed
            )
            && self
                .items
                .iter()
                .any(|i| i.status == OrderItemStatus::PaymentPending)
    }
}

/// An order row for history listings.
#[derive(Debug, Clone)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub final_amount: Decimal,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}
