//! Order types for the admin panel.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use threadly_core::lifecycle::{self, Actor};
use threadly_core::{
    OrderId, OrderItemId, OrderItemStatus, PaymentMethod, PaymentStatus, ReturnStatus, UserId,
};

/// Shipping address as snapshotted on the order at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressSnapshot {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

/// One entry in an item's status history.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub status: OrderItemStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A customer's return request for an item.
#[derive(Debug, Clone)]
pub struct ReturnRequest {
    pub reason: String,
    pub status: ReturnStatus,
    pub refund_amount: Option<Decimal>,
    pub admin_note: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// An ordered item.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: OrderItemId,
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
    /// Shipping statuses this item can move to next.
    #[must_use]
    pub fn next_statuses(&self) -> Vec<OrderItemStatus> {
        lifecycle::admin_progress_options(self.status)
    }

    #[must_use]
    pub fn can_cancel(&self) -> bool {
        lifecycle::transition(self.status, OrderItemStatus::Cancelled, Actor::Admin).is_ok()
    }

    /// Whether a return is waiting on an admin decision.
    #[must_use]
    pub fn awaiting_return_decision(&self) -> bool {
        self.status == OrderItemStatus::ReturnRequested
            && self
                .return_request
                .as_ref()
                .is_some_and(|r| r.status == ReturnStatus::Requested)
    }
}

/// A full order with its customer.
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: AddressSnapshot,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub coupon_code: Option<String>,
    pub delivery_charge: Decimal,
    pub final_amount: Decimal,
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// An order row in the admin listing.
#[derive(Debug, Clone)]
pub struct OrderListItem {
    pub id: OrderId,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub final_amount: Decimal,
    pub item_count: i64,
    /// Item statuses present on the order, for the status column.
    pub statuses: Vec<OrderItemStatus>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: OrderItemStatus, return_status: Option<ReturnStatus>) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(1),
            product_name: "Linen Shirt".to_string(),
            size: "M".to_string(),
            image: None,
            unit_price: Decimal::from(1299),
            quantity: 1,
            line_total: Decimal::from(1299),
            status,
            delivered_at: None,
            history: Vec::new(),
            return_request: return_status.map(|status| ReturnRequest {
                reason: "Too small".to_string(),
                status,
                refund_amount: None,
                admin_note: None,
                requested_at: Utc::now(),
                resolved_at: None,
            }),
        }
    }

    #[test]
    fn test_next_statuses_follow_shipping_path() {
        assert_eq!(
            item(OrderItemStatus::Placed, None).next_statuses(),
            vec![OrderItemStatus::Shipped]
        );
        assert!(item(OrderItemStatus::Delivered, None).next_statuses().is_empty());
    }

    #[test]
    fn test_admin_cannot_cancel_delivered_item() {
        assert!(item(OrderItemStatus::Shipped, None).can_cancel());
        assert!(!item(OrderItemStatus::Delivered, None).can_cancel());
    }

    #[test]
    fn test_unpaid_online_item_can_only_be_cancelled() {
        let unpaid = item(OrderItemStatus::PaymentPending, None);
        assert!(unpaid.can_cancel());
        assert!(unpaid.next_statuses().is_empty());
    }

    #[test]
    fn test_return_decision_pending_only_while_requested() {
        assert!(
            item(OrderItemStatus::ReturnRequested, Some(ReturnStatus::Requested))
                .awaiting_return_decision()
        );
        assert!(
            !item(OrderItemStatus::Returned, Some(ReturnStatus::Approved))
                .awaiting_return_decision()
        );
    }
}
