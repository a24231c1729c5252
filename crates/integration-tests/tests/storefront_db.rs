//! Storefront writes that must hold under concurrency.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`threadly-cli migrate storefront`)
//! - `STOREFRONT_DATABASE_URL` or `DATABASE_URL` pointing at it
//!
//! Every test creates its own users and products, so they can run against a
//! shared development database.
//!
//! Run with: `cargo test -p threadly-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use threadly_core::lifecycle::late_payment_refund;
use threadly_core::{
    AddressId, OrderItemId, OrderItemStatus, PaymentMethod, PaymentStatus, ProductSizeId, UserId,
};
use threadly_integration_tests::{database_url, rupees};
use threadly_storefront::db::coupons::ApplyCouponError;
use threadly_storefront::db::{CartRepository, CouponRepository, OrderRepository, WalletRepository};
use threadly_storefront::services::CheckoutError;
use threadly_storefront::services::checkout::place_order;

async fn pool() -> PgPool {
    PgPool::connect(&database_url()).await.unwrap()
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

async fn create_user(pool: &PgPool) -> UserId {
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO storefront.user (email, name) VALUES ($1, 'Test Customer') RETURNING id",
    )
    .bind(format!("{}@example.com", unique("customer")))
    .fetch_one(pool)
    .await
    .unwrap();
    UserId::new(id)
}

async fn create_address(pool: &PgPool, user_id: UserId) -> AddressId {
    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO storefront.address (user_id, full_name, phone, line1, city, state, pincode, is_default)
        VALUES ($1, 'Test Customer', '9876543210', '12 MG Road', 'Kochi', 'Kerala', '682001', TRUE)
        RETURNING id
        ",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap();
    AddressId::new(id)
}

/// A listed product with one size holding `stock` units.
async fn create_size(pool: &PgPool, price: Decimal, stock: i32) -> ProductSizeId {
    let category: i32 =
        sqlx::query_scalar("INSERT INTO storefront.category (name) VALUES ($1) RETURNING id")
            .bind(unique("category"))
            .fetch_one(pool)
            .await
            .unwrap();
    let brand: i32 =
        sqlx::query_scalar("INSERT INTO storefront.brand (name) VALUES ($1) RETURNING id")
            .bind(unique("brand"))
            .fetch_one(pool)
            .await
            .unwrap();
    let product: i32 = sqlx::query_scalar(
        r"
        INSERT INTO storefront.product (name, category_id, brand_id, price)
        VALUES ('Linen Shirt', $1, $2, $3)
        RETURNING id
        ",
    )
    .bind(category)
    .bind(brand)
    .bind(price)
    .fetch_one(pool)
    .await
    .unwrap();
    let size: i32 = sqlx::query_scalar(
        "INSERT INTO storefront.product_size (product_id, size, stock) VALUES ($1, 'M', $2) RETURNING id",
    )
    .bind(product)
    .bind(stock)
    .fetch_one(pool)
    .await
    .unwrap();
    ProductSizeId::new(size)
}

async fn stock_of(pool: &PgPool, size: ProductSizeId) -> i32 {
    sqlx::query_scalar("SELECT stock FROM storefront.product_size WHERE id = $1")
        .bind(size)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn coupon_uses(pool: &PgPool, code: &str, user_id: UserId) -> i32 {
    sqlx::query_scalar::<_, Option<i32>>(
        r"
        SELECT u.usage_count
        FROM storefront.coupon c
        LEFT JOIN storefront.coupon_usage u ON u.coupon_id = c.id AND u.user_id = $2
        WHERE c.code = $1
        ",
    )
    .bind(code)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap()
    .unwrap_or(0)
}

// ============================================================================
// Coupons
// ============================================================================

#[tokio::test]
#[ignore = "Requires database"]
async fn test_coupon_apply_and_remove_move_usage_by_one() {
    let pool = pool().await;
    let user = create_user(&pool).await;
    let code = unique("SAVE").to_uppercase();
    sqlx::query(
        r"
        INSERT INTO storefront.coupon (code, discount_type, discount_value, usage_limit, expires_at)
        VALUES ($1, 'flat', 100, 2, NOW() + INTERVAL '7 days')
        ",
    )
    .bind(&code)
    .execute(&pool)
    .await
    .unwrap();

    let coupons = CouponRepository::new(&pool);
    let coupon = coupons.get_by_code(&code).await.unwrap().unwrap();

    coupons.apply(user, &coupon).await.unwrap();
    assert_eq!(coupon_uses(&pool, &code, user).await, 1);

    // A second apply is refused and must not count another use.
    assert!(matches!(
        coupons.apply(user, &coupon).await,
        Err(ApplyCouponError::AlreadyApplied)
    ));
    assert_eq!(coupon_uses(&pool, &code, user).await, 1);

    assert_eq!(coupons.remove(user).await.unwrap(), Some(coupon.id));
    assert_eq!(coupon_uses(&pool, &code, user).await, 0);

    assert_eq!(coupons.remove(user).await.unwrap(), None);
    assert_eq!(coupon_uses(&pool, &code, user).await, 0);
}

// ============================================================================
// Stock
// ============================================================================

#[tokio::test]
#[ignore = "Requires database"]
async fn test_concurrent_checkouts_never_oversell() {
    let pool = pool().await;
    let size = create_size(&pool, rupees(49_900), 1).await;

    let mut buyers = Vec::new();
    for _ in 0..2 {
        let user = create_user(&pool).await;
        let address = create_address(&pool, user).await;
        CartRepository::new(&pool)
            .add_item(user, size, 1, 1)
            .await
            .unwrap();
        buyers.push((user, address));
    }

    let (a, b) = tokio::join!(
        place_order(&pool, buyers[0].0, buyers[0].1, PaymentMethod::Cod),
        place_order(&pool, buyers[1].0, buyers[1].1, PaymentMethod::Cod),
    );

    let placed = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(placed, 1);
    let refused = if a.is_ok() { b } else { a };
    assert!(matches!(refused, Err(CheckoutError::OutOfStock(_))));
    assert_eq!(stock_of(&pool, size).await, 0);
}

// ============================================================================
// Wallet
// ============================================================================

#[tokio::test]
#[ignore = "Requires database"]
async fn test_wallet_checkout_refuses_short_balance() {
    let pool = pool().await;
    let user = create_user(&pool).await;
    let address = create_address(&pool, user).await;
    let size = create_size(&pool, rupees(50_000), 3).await;
    let wallets = WalletRepository::new(&pool);

    let topup = unique("order_topup");
    wallets.create_topup(&topup, user, rupees(10_000)).await.unwrap();
    wallets
        .complete_topup(&topup, Some(user), &unique("pay"))
        .await
        .unwrap()
        .unwrap();

    let carts = CartRepository::new(&pool);
    carts.add_item(user, size, 1, 3).await.unwrap();

    let result = place_order(&pool, user, address, PaymentMethod::Wallet).await;
    assert!(matches!(result, Err(CheckoutError::InsufficientWallet)));

    // The whole checkout rolled back.
    assert_eq!(wallets.get(user).await.unwrap().balance, rupees(10_000));
    assert_eq!(stock_of(&pool, size).await, 3);
    assert_eq!(carts.quantity_of(user, size).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_topup_is_credited_once() {
    let pool = pool().await;
    let user = create_user(&pool).await;
    let wallets = WalletRepository::new(&pool);
    let topup = unique("order_topup");
    let payment = unique("pay");
    wallets.create_topup(&topup, user, rupees(25_000)).await.unwrap();

    // Payment callback and webhook racing each other.
    let (callback, webhook) = tokio::join!(
        wallets.complete_topup(&topup, Some(user), &payment),
        wallets.complete_topup(&topup, None, &payment),
    );
    let credited = [callback.unwrap(), webhook.unwrap()]
        .into_iter()
        .flatten()
        .count();
    assert_eq!(credited, 1);

    assert!(wallets
        .complete_topup(&topup, None, &payment)
        .await
        .unwrap()
        .is_none());
    assert_eq!(wallets.get(user).await.unwrap().balance, rupees(25_000));
    assert_eq!(wallets.transaction_count(user).await.unwrap(), 1);
}

// ============================================================================
// Online payments
// ============================================================================

#[tokio::test]
#[ignore = "Requires database"]
async fn test_payment_after_cancel_refunds_cancelled_item() {
    let pool = pool().await;
    let user = create_user(&pool).await;
    let address = create_address(&pool, user).await;
    let carts = CartRepository::new(&pool);
    for _ in 0..2 {
        let size = create_size(&pool, rupees(60_000), 2).await;
        carts.add_item(user, size, 1, 2).await.unwrap();
    }

    let outcome = place_order(&pool, user, address, PaymentMethod::Razorpay)
        .await
        .unwrap();
    let order_id = outcome.order.id;
    let item_ids: Vec<i32> =
        sqlx::query_scalar("SELECT id FROM storefront.order_item WHERE order_id = $1 ORDER BY id")
            .bind(order_id)
            .fetch_all(&pool)
            .await
            .unwrap();

    let orders = OrderRepository::new(&pool);
    let refunded_on_cancel = orders
        .cancel_item(user, OrderItemId::new(item_ids[0]))
        .await
        .unwrap();
    assert_eq!(refunded_on_cancel, Decimal::ZERO);

    // The gateway captures the full amount that was opened before the cancel.
    assert!(orders.confirm_payment(order_id, &unique("pay")).await.unwrap());

    let expected = late_payment_refund(
        outcome.totals.final_amount,
        outcome.totals.subtotal,
        outcome.totals.discount,
        &[
            (rupees(60_000), OrderItemStatus::Cancelled),
            (rupees(60_000), OrderItemStatus::Placed),
        ],
    );
    assert_eq!(expected, rupees(60_000));
    assert_eq!(
        WalletRepository::new(&pool).get(user).await.unwrap().balance,
        expected
    );
    let payment = orders.payment(order_id).await.unwrap().unwrap();
    assert_eq!(payment.payment_status, PaymentStatus::PartiallyRefunded);

    // A repeated webhook changes nothing.
    assert!(!orders.confirm_payment(order_id, &unique("pay")).await.unwrap());
    assert_eq!(
        WalletRepository::new(&pool).get(user).await.unwrap().balance,
        expected
    );
}
