//! Cart storage.
//!
//! Cart lines are keyed by (user, product size). Quantities are capped by the
//! caller-supplied limit inside the upsert so merging two adds can never
//! exceed `min(stock, 5)`.

use rust_decimal::Decimal;
use sqlx::PgPool;

use threadly_core::pricing::effective_unit_price;
use threadly_core::{ProductId, ProductSizeId, UserId};

use super::RepositoryError;
use super::coupons::{COUPON_COLUMNS, CouponRow};
use crate::models::{Cart, CartItem};

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    product_id: i32,
    product_size_id: i32,
    product_name: String,
    size: String,
    image: Option<String>,
    price: Decimal,
    offer_percent: i32,
    category_offer_percent: i32,
    quantity: i32,
    stock: i32,
    available: bool,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            product_size_id: ProductSizeId::new(row.product_size_id),
            product_name: row.product_name,
            size: row.size,
            image: row.image,
            unit_price: effective_unit_price(
                row.price,
                row.offer_percent,
                row.category_offer_percent,
            ),
            quantity: row.quantity,
            stock: row.stock,
            available: row.available,
        }
    }
}

/// Stock and visibility of one product size.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SizeAvailability {
    pub product_id: ProductId,
    pub stock: i32,
    pub available: bool,
}

/// Repository for carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a user's cart with current prices and stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_cart(&mut *conn, user_id).await
    }

    /// Number of units in the cart, for the header badge.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity)::BIGINT FROM storefront.cart_item WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Stock and visibility of a size.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn size_availability(
        &self,
        product_size_id: ProductSizeId,
    ) -> Result<Option<SizeAvailability>, RepositoryError> {
        let row = sqlx::query_as::<_, SizeAvailability>(
            r"
            SELECT s.product_id, s.stock,
                   (p.is_listed AND c.is_listed AND b.is_listed) AS available
            FROM storefront.product_size s
            JOIN storefront.product p ON p.id = s.product_id
            JOIN storefront.category c ON c.id = p.category_id
            JOIN storefront.brand b ON b.id = p.brand_id
            WHERE s.id = $1
            ",
        )
        .bind(product_size_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Current quantity of a size in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        user_id: UserId,
        product_size_id: ProductSizeId,
    ) -> Result<i32, RepositoryError> {
        let quantity: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM storefront.cart_item WHERE user_id = $1 AND product_size_id = $2",
        )
        .bind(user_id)
        .bind(product_size_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(quantity.unwrap_or(0))
    }

    /// Add units of a size, merging with an existing line. The resulting
    /// quantity is capped at `max_quantity`.
    ///
    /// Returns the new line quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_size_id: ProductSizeId,
        quantity: i32,
        max_quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        ensure_cart(&mut *tx, user_id).await?;

        let new_quantity: i32 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.cart_item (user_id, product_size_id, quantity)
            VALUES ($1, $2, LEAST($3, $4))
            ON CONFLICT (user_id, product_size_id) DO UPDATE
            SET quantity = LEAST(storefront.cart_item.quantity + EXCLUDED.quantity, $4)
            RETURNING quantity
            ",
        )
        .bind(user_id)
        .bind(product_size_id)
        .bind(quantity)
        .bind(max_quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(new_quantity)
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_size_id: ProductSizeId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.cart_item
            SET quantity = $3
            WHERE user_id = $1 AND product_size_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_size_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_size_id: ProductSizeId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1 AND product_size_id = $2")
            .bind(user_id)
            .bind(product_size_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

async fn ensure_cart(conn: &mut sqlx::PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO storefront.cart (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Load a cart on an existing connection, e.g. inside the checkout
/// transaction. Lines are locked until the transaction ends.
pub(crate) async fn load_cart(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
) -> Result<Cart, RepositoryError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT p.id AS product_id, s.id AS product_size_id, p.name AS product_name, s.size,
               p.images[1] AS image, p.price, p.offer_percent,
               c.offer_percent AS category_offer_percent,
               ci.quantity, s.stock,
               (p.is_listed AND c.is_listed AND b.is_listed) AS available
        FROM storefront.cart_item ci
        JOIN storefront.product_size s ON s.id = ci.product_size_id
        JOIN storefront.product p ON p.id = s.product_id
        JOIN storefront.category c ON c.id = p.category_id
        JOIN storefront.brand b ON b.id = p.brand_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at
        FOR UPDATE OF ci
        ",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let coupon = sqlx::query_as::<_, CouponRow>(&format!(
        r"
        SELECT {COUPON_COLUMNS}
        FROM storefront.cart k
        JOIN storefront.coupon c ON c.id = k.coupon_id
        WHERE k.user_id = $1
        "
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(Cart {
        items: rows.into_iter().map(Into::into).collect(),
        coupon: coupon.map(Into::into),
    })
}

/// Empty a cart after an order is placed. The coupon is detached without
/// giving its use back.
pub(crate) async fn clear_cart(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE storefront.cart SET coupon_id = NULL, updated_at = NOW() WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
