//! Pricing a cart and turning it into an order.
//!
//! Everything [`place_order`] writes (stock, order, items, wallet debit,
//! cart) happens in one transaction. A failure at any step leaves the
//! catalog, the wallet and the cart as they were.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use threadly_core::pricing::{CartTotals, CouponError, DeliverySettings, GeoPoint};
use threadly_core::{AddressId, OrderItemStatus, PaymentMethod, PaymentStatus, UserId};

use crate::db::cart::{clear_cart, load_cart};
use crate::db::coupons::{release_cart_coupon, user_usage};
use crate::db::orders::{NewOrder, NewOrderItem, PlacedOrder, decrement_stock, insert_order};
use crate::db::wallet::debit;
use crate::db::{AddressRepository, RepositoryError, SettingsRepository};
use crate::models::{Cart, Coupon};

/// Why an order could not be placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,
    #[error("{0} is no longer available")]
    Unavailable(String),
    #[error("{0} does not have enough stock")]
    OutOfStock(String),
    #[error("your wallet balance is too low for this order")]
    InsufficientWallet,
    #[error("please choose a delivery address")]
    AddressNotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

/// A successfully placed order.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: PlacedOrder,
    pub payment_method: PaymentMethod,
    pub totals: CartTotals,
    /// The cart's coupon stopped being valid and was not applied.
    pub coupon_dropped: bool,
}

/// Discount an applied coupon gives on `subtotal`.
///
/// `user_usage` counts the use taken when the coupon was applied, so the
/// limit is checked against the uses before this one.
///
/// # Errors
///
/// Returns the [`CouponError`] the coupon now fails.
pub fn applied_coupon_discount(
    coupon: &Coupon,
    subtotal: Decimal,
    user_usage: i32,
    now: DateTime<Utc>,
) -> Result<Decimal, CouponError> {
    coupon
        .rules
        .apply(subtotal, (user_usage - 1).max(0), now)
}

/// Totals for a cart with a known coupon discount.
#[must_use]
pub fn price_cart(
    cart: &Cart,
    discount: Decimal,
    delivery: &DeliverySettings,
    destination: Option<GeoPoint>,
) -> CartTotals {
    let subtotal = cart.subtotal();
    if subtotal <= Decimal::ZERO {
        return CartTotals::default();
    }
    let discounted = CartTotals::new(subtotal, discount, Decimal::ZERO).discounted_subtotal();
    CartTotals::new(
        subtotal,
        discount,
        delivery.charge_for(discounted, destination),
    )
}

/// Item and payment status a new order starts with.
#[must_use]
pub const fn initial_statuses(method: PaymentMethod) -> (OrderItemStatus, PaymentStatus) {
    match method {
        PaymentMethod::Cod => (OrderItemStatus::Placed, PaymentStatus::Pending),
        PaymentMethod::Wallet => (OrderItemStatus::Placed, PaymentStatus::Paid),
        PaymentMethod::Razorpay => (OrderItemStatus::PaymentPending, PaymentStatus::Pending),
    }
}

/// Place an order for the user's cart.
///
/// Razorpay orders are created `payment_pending`; the caller opens a
/// gateway order for them afterwards.
///
/// # Errors
///
/// Returns a [`CheckoutError`] describing the first problem found. Nothing
/// is written in that case.
#[instrument(skip(pool))]
pub async fn place_order(
    pool: &PgPool,
    user_id: UserId,
    address_id: AddressId,
    payment_method: PaymentMethod,
) -> Result<CheckoutOutcome, CheckoutError> {
    let address = AddressRepository::new(pool)
        .get(user_id, address_id)
        .await?
        .ok_or(CheckoutError::AddressNotFound)?;
    let delivery = SettingsRepository::new(pool).delivery().await?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let cart = load_cart(&mut *tx, user_id).await?;
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    for item in &cart.items {
        if !item.available {
            return Err(CheckoutError::Unavailable(item.product_name.clone()));
        }
        if item.quantity > item.stock {
            return Err(CheckoutError::OutOfStock(item.product_name.clone()));
        }
    }

    for item in &cart.items {
        if !decrement_stock(&mut *tx, item.product_size_id, item.quantity).await? {
            return Err(CheckoutError::OutOfStock(item.product_name.clone()));
        }
    }

    let subtotal = cart.subtotal();
    let mut coupon_dropped = false;
    let mut discount = Decimal::ZERO;
    let mut coupon_code = None;
    if let Some(coupon) = &cart.coupon {
        let used = user_usage(&mut *tx, coupon.id, user_id).await?;
        match applied_coupon_discount(coupon, subtotal, used, now) {
            Ok(amount) => {
                discount = amount;
                coupon_code = Some(coupon.code.clone());
            }
            Err(reason) => {
                warn!(code = %coupon.code, %reason, "Dropping invalid coupon at checkout");
                release_cart_coupon(&mut *tx, user_id).await?;
                coupon_dropped = true;
            }
        }
    }

    let totals = price_cart(&cart, discount, &delivery, address.location);
    let (item_status, payment_status) = initial_statuses(payment_method);

    let order = insert_order(
        &mut *tx,
        &NewOrder {
            user_id,
            shipping_address: address.snapshot(),
            payment_method,
            payment_status,
            totals,
            coupon_code,
            item_status,
            items: cart
                .items
                .iter()
                .map(|item| NewOrderItem {
                    product_id: item.product_id,
                    product_size_id: item.product_size_id,
                    product_name: item.product_name.clone(),
                    size: item.size.clone(),
                    image: item.image.clone(),
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    line_total: item.line_total(),
                })
                .collect(),
        },
    )
    .await?;

    if payment_method == PaymentMethod::Wallet {
        let description = format!("Payment for order {}", order.order_number);
        if !debit(
            &mut *tx,
            user_id,
            totals.final_amount,
            &description,
            Some(order.id),
        )
        .await?
        {
            return Err(CheckoutError::InsufficientWallet);
        }
    }

    clear_cart(&mut *tx, user_id).await?;
    tx.commit().await?;

    info!(
        order_number = %order.order_number,
        method = %payment_method,
        amount = %totals.final_amount,
        "Order placed"
    );

    Ok(CheckoutOutcome {
        order,
        payment_method,
        totals,
        coupon_dropped,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use threadly_core::pricing::CouponRules;
    use threadly_core::{CouponId, DiscountType, ProductId, ProductSizeId};

    use super::*;
    use crate::models::CartItem;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(price: Decimal, qty: i32) -> CartItem {
        CartItem {
            product_id: ProductId::new(1),
            product_size_id: ProductSizeId::new(1),
            product_name: "Linen Shirt".to_string(),
            size: "M".to_string(),
            image: None,
            unit_price: price,
            quantity: qty,
            stock: 10,
            available: true,
        }
    }

    fn coupon(limit: i32) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "SAVE10".to_string(),
            description: String::new(),
            rules: CouponRules {
                discount_type: DiscountType::Percentage,
                value: d("10"),
                min_purchase: d("500"),
                max_discount: None,
                usage_limit: limit,
                expires_at: Utc::now() + Duration::days(1),
                is_active: true,
            },
        }
    }

    fn flat_delivery() -> DeliverySettings {
        DeliverySettings {
            base_charge: d("40"),
            per_km_rate: Decimal::ZERO,
            free_delivery_threshold: Some(d("999")),
            store_location: None,
        }
    }

    #[test]
    fn test_price_cart_total_invariant() {
        let cart = Cart {
            items: vec![item(d("450"), 1), item(d("199.50"), 2)],
            coupon: None,
        };
        let totals = price_cart(&cart, d("84.90"), &flat_delivery(), None);
        assert_eq!(totals.subtotal, d("849.00"));
        assert_eq!(totals.delivery_charge, d("40"));
        assert_eq!(
            totals.final_amount,
            totals.subtotal - totals.discount + totals.delivery_charge
        );
    }

    #[test]
    fn test_free_delivery_uses_discounted_subtotal() {
        let cart = Cart {
            items: vec![item(d("1000"), 1)],
            coupon: None,
        };
        assert_eq!(
            price_cart(&cart, Decimal::ZERO, &flat_delivery(), None).delivery_charge,
            Decimal::ZERO
        );
        assert_eq!(
            price_cart(&cart, d("100"), &flat_delivery(), None).delivery_charge,
            d("40")
        );
    }

    #[test]
    fn test_empty_cart_prices_to_zero() {
        let totals = price_cart(&Cart::default(), Decimal::ZERO, &flat_delivery(), None);
        assert_eq!(totals, CartTotals::default());
    }

    #[test]
    fn test_applied_coupon_counts_its_own_use() {
        let c = coupon(1);
        // The single allowed use is the one taken when applying.
        assert_eq!(
            applied_coupon_discount(&c, d("1000"), 1, Utc::now()).unwrap(),
            d("100")
        );
        assert!(matches!(
            applied_coupon_discount(&c, d("1000"), 2, Utc::now()),
            Err(CouponError::UsageLimitReached)
        ));
        assert!(matches!(
            applied_coupon_discount(&c, d("400"), 1, Utc::now()),
            Err(CouponError::MinimumNotMet { .. })
        ));
    }

    #[test]
    fn test_initial_statuses() {
        assert_eq!(
            initial_statuses(PaymentMethod::Razorpay),
            (OrderItemStatus::PaymentPending, PaymentStatus::Pending)
        );
        assert_eq!(
            initial_statuses(PaymentMethod::Wallet),
            (OrderItemStatus::Placed, PaymentStatus::Paid)
        );
        assert_eq!(
            initial_statuses(PaymentMethod::Cod),
            (OrderItemStatus::Placed, PaymentStatus::Pending)
        );
    }
}
