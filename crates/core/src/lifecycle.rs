//! Order item lifecycle.
//!
//! Every ordered item moves through [`OrderItemStatus`] values independently.
//! Each move is checked by [`transition`] and recorded as a [`StatusEvent`] in
//! the item's history. Refund amounts for cancellations and returns are
//! computed here so that the storefront and admin agree on them.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OrderItemStatus, PaymentMethod, PaymentStatus, round_money};

/// Days after delivery during which a return may be requested.
pub const RETURN_WINDOW_DAYS: i64 = 7;

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer,
    Admin,
    /// Payment callbacks and webhooks.
    System,
}

/// A status change that is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move item from {} to {}", from.label(), to.label())]
pub struct TransitionError {
    pub from: OrderItemStatus,
    pub to: OrderItemStatus,
}

/// One entry of an item's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: OrderItemStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    #[must_use]
    pub fn now(status: OrderItemStatus, note: Option<String>) -> Self {
        Self {
            status,
            note,
            at: Utc::now(),
        }
    }
}

/// Statuses reachable from `from` by `actor`.
#[must_use]
pub const fn allowed_targets(from: OrderItemStatus, actor: Actor) -> &'static [OrderItemStatus] {
    use OrderItemStatus::{
        Cancelled, Delivered, OutForDelivery, PaymentPending, Placed, ReturnRejected,
        ReturnRequested, Returned, Shipped,
    };

    match (actor, from) {
        (Actor::Customer, PaymentPending | Placed) => &[Cancelled],
        (Actor::Customer, Delivered) => &[ReturnRequested],
        (Actor::Admin, PaymentPending) => &[Cancelled],
        (Actor::Admin, Placed) => &[Shipped, Cancelled],
        (Actor::Admin, Shipped) => &[OutForDelivery, Cancelled],
        (Actor::Admin, OutForDelivery) => &[Delivered],
        (Actor::Admin, ReturnRequested) => &[Returned, ReturnRejected],
        (Actor::System, PaymentPending) => &[Placed, Cancelled],
        _ => &[],
    }
}

/// Check a status change.
///
/// # Errors
///
/// Returns [`TransitionError`] if `actor` may not move an item from `from` to `to`.
pub fn transition(
    from: OrderItemStatus,
    to: OrderItemStatus,
    actor: Actor,
) -> Result<OrderItemStatus, TransitionError> {
    if allowed_targets(from, actor).contains(&to) {
        Ok(to)
    } else {
        Err(TransitionError { from, to })
    }
}

/// Forward shipping statuses an admin can pick for an item (cancel excluded).
#[must_use]
pub fn admin_progress_options(from: OrderItemStatus) -> Vec<OrderItemStatus> {
    allowed_targets(from, Actor::Admin)
        .iter()
        .copied()
        .filter(|s| {
            !matches!(
                s,
                OrderItemStatus::Cancelled
                    | OrderItemStatus::Returned
                    | OrderItemStatus::ReturnRejected
            )
        })
        .collect()
}

/// Whether a delivered item can still be returned.
#[must_use]
pub fn return_window_open(delivered_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now <= delivered_at + Duration::days(RETURN_WINDOW_DAYS)
}

/// Amount refunded for one item.
///
/// The item gives back its proportional share of the order's coupon discount,
/// so refunding every item never returns more than was paid for goods.
#[must_use]
pub fn refund_for_item(line_total: Decimal, order_subtotal: Decimal, order_discount: Decimal) -> Decimal {
    if order_subtotal <= Decimal::ZERO || line_total <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let share = order_discount * line_total / order_subtotal;
    round_money((line_total - share).max(Decimal::ZERO))
}

/// Refund for cancelling an item.
///
/// The delivery charge is returned with the last item still in play, since
/// nothing will ship once it is cancelled.
#[must_use]
pub fn cancellation_refund(
    line_total: Decimal,
    order_subtotal: Decimal,
    order_discount: Decimal,
    delivery_charge: Decimal,
    is_last_active_item: bool,
) -> Decimal {
    let item = refund_for_item(line_total, order_subtotal, order_discount);
    if is_last_active_item {
        round_money(item + delivery_charge)
    } else {
        item
    }
}

/// Whether an item is still headed for, or with, the customer.
#[must_use]
pub const fn is_outstanding(status: OrderItemStatus) -> bool {
    !matches!(
        status,
        OrderItemStatus::Cancelled | OrderItemStatus::Returned
    )
}

/// Payment status of a prepaid order after one of its items was refunded.
///
/// `statuses` are the item statuses after the refund was applied.
#[must_use]
pub fn payment_status_after_refund(statuses: &[OrderItemStatus]) -> PaymentStatus {
    if statuses.iter().all(|s| !is_outstanding(*s)) {
        PaymentStatus::Refunded
    } else {
        PaymentStatus::PartiallyRefunded
    }
}

/// Payment status of an order after one of its items was refunded to the wallet.
///
/// A cash-on-delivery order that still has items on the way has not been
/// collected yet, so it stays `pending` until [`cod_collection_status`]
/// settles it.
#[must_use]
pub fn payment_status_after_item_refund(
    method: PaymentMethod,
    current: PaymentStatus,
    statuses: &[OrderItemStatus],
) -> PaymentStatus {
    if method == PaymentMethod::Cod && current == PaymentStatus::Pending && !cod_collected(statuses)
    {
        return PaymentStatus::Pending;
    }
    payment_status_after_refund(statuses)
}

/// Status a pending cash-on-delivery order moves to once collected.
///
/// `None` while items are still on the way. Returns approved before the
/// last delivery were refunded to the wallet, so such an order is only
/// partially paid.
#[must_use]
pub fn cod_collection_status(statuses: &[OrderItemStatus]) -> Option<PaymentStatus> {
    if !cod_collected(statuses) {
        return None;
    }
    if statuses.contains(&OrderItemStatus::Returned) {
        Some(payment_status_after_refund(statuses))
    } else {
        Some(PaymentStatus::Paid)
    }
}

/// Refund owed when an online payment lands after some items were cancelled.
///
/// Items cancelled while the payment was outstanding were refunded nothing,
/// so the captured amount covers them. `items` holds each item's line total
/// and current status. With nothing left to ship, everything paid goes back.
#[must_use]
pub fn late_payment_refund(
    final_amount: Decimal,
    order_subtotal: Decimal,
    order_discount: Decimal,
    items: &[(Decimal, OrderItemStatus)],
) -> Decimal {
    if items.iter().all(|(_, status)| !is_outstanding(*status)) {
        return final_amount;
    }
    let owed: Decimal = items
        .iter()
        .filter(|(_, status)| *status == OrderItemStatus::Cancelled)
        .map(|(line_total, _)| refund_for_item(*line_total, order_subtotal, order_discount))
        .sum();
    round_money(owed.min(final_amount))
}

/// Whether a cash-on-delivery order has been fully collected.
///
/// True once every item that was not cancelled has been delivered.
#[must_use]
pub fn cod_collected(statuses: &[OrderItemStatus]) -> bool {
    let mut any_delivered = false;
    for status in statuses {
        match status {
            OrderItemStatus::Cancelled => {}
            OrderItemStatus::Delivered
            | OrderItemStatus::ReturnRequested
            | OrderItemStatus::Returned
            | OrderItemStatus::ReturnRejected => any_delivered = true,
            _ => return false,
        }
    }
    any_delivered
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use OrderItemStatus::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_admin_shipping_path() {
        assert_eq!(transition(Placed, Shipped, Actor::Admin), Ok(Shipped));
        assert_eq!(
            transition(Shipped, OutForDelivery, Actor::Admin),
            Ok(OutForDelivery)
        );
        assert_eq!(
            transition(OutForDelivery, Delivered, Actor::Admin),
            Ok(Delivered)
        );
    }

    #[test]
    fn test_admin_cannot_skip_or_reverse() {
        assert!(transition(Placed, Delivered, Actor::Admin).is_err());
        assert!(transition(Delivered, Shipped, Actor::Admin).is_err());
        assert!(transition(OutForDelivery, Cancelled, Actor::Admin).is_err());
        assert!(transition(PaymentPending, Shipped, Actor::Admin).is_err());
    }

    #[test]
    fn test_customer_cancel_rules() {
        assert!(transition(Placed, Cancelled, Actor::Customer).is_ok());
        assert!(transition(PaymentPending, Cancelled, Actor::Customer).is_ok());
        assert!(transition(Shipped, Cancelled, Actor::Customer).is_err());
        assert!(transition(Delivered, ReturnRequested, Actor::Customer).is_ok());
        assert!(transition(Delivered, Returned, Actor::Customer).is_err());
    }

    #[test]
    fn test_admin_releases_abandoned_payment() {
        assert_eq!(
            transition(PaymentPending, Cancelled, Actor::Admin),
            Ok(Cancelled)
        );
        assert!(admin_progress_options(PaymentPending).is_empty());
    }

    #[test]
    fn test_late_payment_refunds_items_cancelled_while_unpaid() {
        // 1000 + 1000 subtotal, no discount, 40 delivery: one item cancelled.
        let items = [(d("1000"), Cancelled), (d("1000"), Placed)];
        assert_eq!(
            late_payment_refund(d("2040"), d("2000"), Decimal::ZERO, &items),
            d("1000")
        );
        let with_coupon = [(d("1000"), Cancelled), (d("3000"), Placed)];
        assert_eq!(
            late_payment_refund(d("3640"), d("4000"), d("400"), &with_coupon),
            d("900")
        );
    }

    #[test]
    fn test_late_payment_refunds_everything_when_nothing_ships() {
        let items = [(d("1000"), Cancelled), (d("1000"), Cancelled)];
        assert_eq!(
            late_payment_refund(d("2040"), d("2000"), Decimal::ZERO, &items),
            d("2040")
        );
        let none_cancelled = [(d("1000"), Placed)];
        assert_eq!(
            late_payment_refund(d("1040"), d("1000"), Decimal::ZERO, &none_cancelled),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_system_confirms_payment() {
        assert!(transition(PaymentPending, Placed, Actor::System).is_ok());
        assert!(transition(Placed, Placed, Actor::System).is_err());
    }

    #[test]
    fn test_admin_progress_options() {
        assert_eq!(admin_progress_options(Placed), vec![Shipped]);
        assert_eq!(admin_progress_options(OutForDelivery), vec![Delivered]);
        assert!(admin_progress_options(Delivered).is_empty());
    }

    #[test]
    fn test_return_window() {
        let delivered = Utc::now() - Duration::days(3);
        assert!(return_window_open(delivered, Utc::now()));
        assert!(!return_window_open(delivered, delivered + Duration::days(8)));
    }

    #[test]
    fn test_refund_removes_discount_share() {
        // 1000 + 3000 subtotal, 400 discount: the 1000 item carries 100 of it.
        assert_eq!(refund_for_item(d("1000"), d("4000"), d("400")), d("900"));
        assert_eq!(refund_for_item(d("3000"), d("4000"), d("400")), d("2700"));
        assert_eq!(refund_for_item(d("1000"), d("1000"), Decimal::ZERO), d("1000"));
    }

    #[test]
    fn test_last_cancellation_refunds_delivery() {
        assert_eq!(
            cancellation_refund(d("500"), d("500"), Decimal::ZERO, d("40"), true),
            d("540")
        );
        assert_eq!(
            cancellation_refund(d("500"), d("1000"), Decimal::ZERO, d("40"), false),
            d("500")
        );
    }

    #[test]
    fn test_payment_status_after_refund() {
        assert_eq!(
            payment_status_after_refund(&[Cancelled, Returned]),
            PaymentStatus::Refunded
        );
        assert_eq!(
            payment_status_after_refund(&[Cancelled, Placed]),
            PaymentStatus::PartiallyRefunded
        );
    }

    #[test]
    fn test_cod_return_before_collection_keeps_order_pending() {
        let statuses = [Returned, Shipped];
        assert_eq!(
            payment_status_after_item_refund(PaymentMethod::Cod, PaymentStatus::Pending, &statuses),
            PaymentStatus::Pending
        );
        assert_eq!(
            payment_status_after_item_refund(PaymentMethod::Razorpay, PaymentStatus::Paid, &statuses),
            PaymentStatus::PartiallyRefunded
        );
        assert_eq!(
            payment_status_after_item_refund(PaymentMethod::Cod, PaymentStatus::Pending, &[Returned, Delivered]),
            PaymentStatus::PartiallyRefunded
        );
    }

    #[test]
    fn test_cod_collection_status() {
        assert_eq!(cod_collection_status(&[Returned, Shipped]), None);
        assert_eq!(
            cod_collection_status(&[Delivered, Cancelled]),
            Some(PaymentStatus::Paid)
        );
        assert_eq!(
            cod_collection_status(&[Returned, Delivered]),
            Some(PaymentStatus::PartiallyRefunded)
        );
    }

    #[test]
    fn test_cod_collected() {
        assert!(cod_collected(&[Delivered, Cancelled]));
        assert!(!cod_collected(&[Delivered, Shipped]));
        assert!(!cod_collected(&[Cancelled]));
    }
}
