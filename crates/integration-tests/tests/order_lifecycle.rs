//! Order item transitions and refund amounts.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use threadly_core::lifecycle::{
    Actor, admin_progress_options, cancellation_refund, cod_collected,
    payment_status_after_refund, refund_for_item, return_window_open, transition,
};
use threadly_core::{OrderItemStatus, PaymentStatus};
use threadly_integration_tests::rupees;

use OrderItemStatus::{
    Cancelled, Delivered, OutForDelivery, PaymentPending, Placed, ReturnRejected, ReturnRequested,
    Returned, Shipped,
};

#[test]
fn test_admin_walks_the_shipping_path() {
    let mut status = Placed;
    for next in [Shipped, OutForDelivery, Delivered] {
        assert_eq!(admin_progress_options(status), vec![next]);
        status = transition(status, next, Actor::Admin).unwrap();
    }
    assert!(admin_progress_options(status).is_empty());
}

#[test]
fn test_no_actor_skips_a_step_or_leaves_a_final_state() {
    for actor in [Actor::Customer, Actor::Admin, Actor::System] {
        assert!(transition(Placed, Delivered, actor).is_err());
        for from in [Cancelled, Returned, ReturnRejected] {
            for to in OrderItemStatus::ALL {
                assert!(transition(from, to, actor).is_err(), "{from} -> {to}");
            }
        }
    }
}

#[test]
fn test_who_may_cancel() {
    assert!(transition(Placed, Cancelled, Actor::Customer).is_ok());
    assert!(transition(Shipped, Cancelled, Actor::Customer).is_err());
    assert!(transition(Shipped, Cancelled, Actor::Admin).is_ok());
    assert!(transition(OutForDelivery, Cancelled, Actor::Admin).is_err());
    assert!(transition(PaymentPending, Cancelled, Actor::System).is_ok());
    // An abandoned online payment still holds stock until someone cancels it.
    assert!(transition(PaymentPending, Cancelled, Actor::Admin).is_ok());
    assert!(transition(PaymentPending, Cancelled, Actor::Customer).is_ok());
}

#[test]
fn test_returns_are_customer_requested_and_admin_decided() {
    assert!(transition(Delivered, ReturnRequested, Actor::Customer).is_ok());
    assert!(transition(Delivered, ReturnRequested, Actor::Admin).is_err());
    assert!(transition(ReturnRequested, Returned, Actor::Admin).is_ok());
    assert!(transition(ReturnRequested, ReturnRejected, Actor::Admin).is_ok());
    assert!(transition(ReturnRequested, Returned, Actor::Customer).is_err());
}

#[test]
fn test_return_window_is_seven_days() {
    let delivered = Utc::now() - Duration::days(10);
    assert!(return_window_open(delivered, delivered + Duration::days(7)));
    assert!(!return_window_open(
        delivered,
        delivered + Duration::days(7) + Duration::seconds(1)
    ));
}

#[test]
fn test_refunds_share_the_coupon_discount() {
    // Two lines of 600 and 400 with a 100 coupon: 60 and 40 of it are lost.
    let subtotal = Decimal::from(1000);
    let discount = Decimal::from(100);
    let first = refund_for_item(Decimal::from(600), subtotal, discount);
    let second = refund_for_item(Decimal::from(400), subtotal, discount);
    assert_eq!(first, Decimal::from(540));
    assert_eq!(second, Decimal::from(360));
    assert_eq!(first + second, subtotal - discount);
}

#[test]
fn test_last_cancelled_item_refunds_delivery() {
    let refund = cancellation_refund(
        rupees(49_900),
        rupees(49_900),
        Decimal::ZERO,
        Decimal::from(60),
        true,
    );
    assert_eq!(refund, rupees(55_900));

    let partial = cancellation_refund(
        rupees(49_900),
        rupees(99_800),
        Decimal::ZERO,
        Decimal::from(60),
        false,
    );
    assert_eq!(partial, rupees(49_900));
}

#[test]
fn test_payment_status_after_refunds() {
    assert_eq!(
        payment_status_after_refund(&[Cancelled, Delivered]),
        PaymentStatus::PartiallyRefunded
    );
    assert_eq!(
        payment_status_after_refund(&[Cancelled, Returned]),
        PaymentStatus::Refunded
    );
}

#[test]
fn test_cod_collected_once_everything_is_delivered() {
    assert!(!cod_collected(&[Delivered, Shipped]));
    assert!(cod_collected(&[Delivered, Cancelled]));
    assert!(cod_collected(&[ReturnRequested, Delivered]));
    assert!(!cod_collected(&[Cancelled]));
}
