//! Cart route handlers.
//!
//! Quantity changes use HTMX: handlers return the re-rendered cart fragment
//! and fire `cart-updated` so the header badge refreshes itself. Coupon
//! actions are plain form posts that redirect back to the cart.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use threadly_core::pricing::{
    CartTotals, CouponError, edited_line_quantity, max_line_quantity, normalize_code,
    requested_quantity,
};
use threadly_core::{DiscountType, ProductSizeId, UserId};

use crate::db::coupons::{ApplyCouponError, AvailableCoupon};
use crate::db::{AddressRepository, CartRepository, CouponRepository, SettingsRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth, RequireAuth};
use crate::models::{Cart, Coupon};
use crate::routes::{Flash, MessageQuery};
use crate::services::checkout::{applied_coupon_discount, price_cart};
use crate::state::AppState;

/// A priced cart ready for display.
pub struct CartView {
    pub cart: Cart,
    pub totals: CartTotals,
    /// The applied coupon stopped being valid and will not be used.
    pub coupon_invalid: bool,
}

impl CartView {
    #[must_use]
    pub fn coupon(&self) -> Option<&Coupon> {
        self.cart.coupon.as_ref()
    }
}

/// Price a user's cart with its coupon and the default address's delivery charge.
///
/// # Errors
///
/// Returns `AppError::Database` if a query fails.
pub async fn load_cart_view(state: &AppState, user_id: UserId) -> Result<CartView, AppError> {
    let pool = state.pool();
    let cart = CartRepository::new(pool).get(user_id).await?;
    let delivery = SettingsRepository::new(pool).delivery().await?;
    let destination = AddressRepository::new(pool)
        .get_default(user_id)
        .await?
        .and_then(|a| a.location);

    let mut coupon_invalid = false;
    let discount = match &cart.coupon {
        Some(coupon) => {
            let used = CouponRepository::new(pool)
                .user_usage(coupon.id, user_id)
                .await?;
            applied_coupon_discount(coupon, cart.subtotal(), used, Utc::now()).unwrap_or_else(
                |_| {
                    coupon_invalid = true;
                    Decimal::ZERO
                },
            )
        }
        None => Decimal::ZERO,
    };

    let totals = price_cart(&cart, discount, &delivery, destination);
    Ok(CartView {
        cart,
        totals,
        coupon_invalid,
    })
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_size_id: i32,
    pub quantity: Option<i32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_size_id: i32,
    pub quantity: i32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_size_id: i32,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    pub code: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub view: CartView,
    pub flash: Flash,
    pub nonce: String,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub view: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: i64,
}

/// "Added" confirmation fragment shown on the product page.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_added.html")]
pub struct CartAddedTemplate {
    pub quantity: i32,
    pub capped: bool,
}

/// Available coupons page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/coupons.html")]
pub struct CouponsTemplate {
    pub coupons: Vec<AvailableCoupon>,
    pub nonce: String,
}

/// Display cart page.
#[instrument(skip(state, nonce))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> Result<CartShowTemplate, AppError> {
    let view = load_cart_view(&state, user.id).await?;
    Ok(CartShowTemplate {
        view,
        flash: query.flash(),
        nonce,
    })
}

/// Add a size to the cart (HTMX).
///
/// Merges with an existing line. The line never exceeds `min(stock, 5)`.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddToCartForm>,
) -> Result<Response, AppError> {
    let carts = CartRepository::new(state.pool());
    let size_id = ProductSizeId::new(form.product_size_id);

    let size = carts
        .size_availability(size_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product size not found".to_string()))?;
    if !size.available {
        return Err(AppError::BadRequest(
            "This product is no longer available".to_string(),
        ));
    }
    if size.stock <= 0 {
        return Err(AppError::BadRequest("This size is out of stock".to_string()));
    }

    let requested = requested_quantity(form.quantity);
    let max = max_line_quantity(size.stock);
    let before = carts.quantity_of(user.id, size_id).await?;
    let quantity = carts.add_item(user.id, size_id, requested, max).await?;
    let capped = form.quantity.is_some_and(|q| q > requested) || before + requested > quantity;

    tracing::info!(
        user_id = %user.id,
        product_size_id = %size_id,
        quantity,
        "Added to cart"
    );

    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartAddedTemplate {
            quantity,
            capped,
        },
    )
        .into_response())
}

/// Update a line's quantity (HTMX). Zero removes the line.
#[instrument(skip(state))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response, AppError> {
    let carts = CartRepository::new(state.pool());
    let size_id = ProductSizeId::new(form.product_size_id);

    if form.quantity <= 0 {
        carts.remove_item(user.id, size_id).await?;
    } else {
        let stock = carts
            .size_availability(size_id)
            .await?
            .map_or(0, |s| s.stock);
        let Some(quantity) = edited_line_quantity(form.quantity, stock) else {
            return Err(AppError::BadRequest("This size is out of stock".to_string()));
        };
        carts.update_quantity(user.id, size_id, quantity).await?;
    }

    let view = load_cart_view(&state, user.id).await?;
    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate { view },
    )
        .into_response())
}

/// Remove a line (HTMX).
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response, AppError> {
    CartRepository::new(state.pool())
        .remove_item(user.id, ProductSizeId::new(form.product_size_id))
        .await?;

    let view = load_cart_view(&state, user.id).await?;
    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate { view },
    )
        .into_response())
}

/// Get cart count badge (HTMX). Anonymous visitors see zero.
#[instrument(skip(state))]
pub async fn count(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<CartCountTemplate, AppError> {
    let count = match user {
        Some(user) => CartRepository::new(state.pool()).count(user.id).await?,
        None => 0,
    };
    Ok(CartCountTemplate { count })
}

/// Apply a coupon code to the cart.
///
/// The code is checked against the cart subtotal before the use is counted.
#[instrument(skip(state, form), fields(code = %form.code))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CouponForm>,
) -> Result<Redirect, AppError> {
    let pool = state.pool();
    let coupons = CouponRepository::new(pool);

    let Some(coupon) = coupons.get_by_code(&normalize_code(&form.code)).await? else {
        return Ok(Redirect::to("/cart?error=coupon_invalid"));
    };

    let cart = CartRepository::new(pool).get(user.id).await?;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart?error=empty_cart"));
    }
    if cart.coupon.is_some() {
        return Ok(Redirect::to("/cart?error=coupon_applied"));
    }

    let used = coupons.user_usage(coupon.id, user.id).await?;
    if let Err(e) = coupon.rules.validate(cart.subtotal(), used, Utc::now()) {
        tracing::info!(code = %coupon.code, error = %e, "Coupon rejected");
        return Ok(Redirect::to(&format!("/cart?error={}", coupon_error_code(&e))));
    }

    match coupons.apply(user.id, &coupon).await {
        Ok(()) => {
            tracing::info!(user_id = %user.id, code = %coupon.code, "Coupon applied");
            Ok(Redirect::to("/cart?success=coupon_applied"))
        }
        Err(ApplyCouponError::AlreadyApplied) => Ok(Redirect::to("/cart?error=coupon_applied")),
        Err(ApplyCouponError::UsageLimitReached) => Ok(Redirect::to("/cart?error=coupon_limit")),
        Err(ApplyCouponError::Repository(e)) => Err(e.into()),
    }
}

/// Remove the cart's coupon and give the use back.
#[instrument(skip(state))]
pub async fn remove_coupon(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Redirect, AppError> {
    CouponRepository::new(state.pool()).remove(user.id).await?;
    Ok(Redirect::to("/cart?success=coupon_removed"))
}

/// Coupons the user can still use.
#[instrument(skip(state, nonce))]
pub async fn coupons(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
) -> Result<CouponsTemplate, AppError> {
    let coupons = CouponRepository::new(state.pool())
        .available_for(user.id, Utc::now())
        .await?;
    Ok(CouponsTemplate { coupons, nonce })
}

/// Flash code for a rejected coupon.
const fn coupon_error_code(e: &CouponError) -> &'static str {
    match e {
        CouponError::Inactive => "coupon_inactive",
        CouponError::Expired => "coupon_expired",
        CouponError::MinimumNotMet { .. } => "coupon_minimum",
        CouponError::UsageLimitReached => "coupon_limit",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupon_error_codes_have_messages() {
        let errors = [
            CouponError::Inactive,
            CouponError::Expired,
            CouponError::MinimumNotMet {
                minimum: "₹500.00".to_string(),
            },
            CouponError::UsageLimitReached,
        ];
        for e in &errors {
            let query = MessageQuery {
                error: Some(coupon_error_code(e).to_string()),
                success: None,
            };
            assert!(query.flash().error.is_some(), "no message for {e:?}");
        }
    }
}
