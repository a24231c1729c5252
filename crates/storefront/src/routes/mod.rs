//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                               - Home page
//! GET  /health                         - Health check
//!
//! # Catalog
//! GET  /shop                           - Product listing (filters, sort, pages)
//! GET  /products/{id}                  - Product detail
//!
//! # Cart (HTMX fragments where noted)
//! GET  /cart                           - Cart page
//! POST /cart/add                       - Add to cart (fragment, triggers cart-updated)
//! POST /cart/update                    - Update quantity
//! POST /cart/remove                    - Remove line
//! GET  /cart/count                     - Cart count badge (fragment)
//! POST /cart/coupon                    - Apply coupon
//! POST /cart/coupon/remove             - Remove coupon
//! GET  /coupons                        - Available coupons
//!
//! # Checkout
//! GET  /checkout                       - Address, summary and payment choice
//! POST /checkout                       - Place order
//! POST /checkout/razorpay/verify       - Razorpay Checkout callback
//! GET  /orders/{id}/pay                - Retry a Razorpay payment
//! GET  /orders/{id}/success            - Order confirmation
//! POST /webhooks/razorpay              - Razorpay webhook
//!
//! # Orders
//! GET  /orders                         - Order history
//! GET  /orders/{id}                    - Order detail
//! GET  /orders/{id}/invoice            - Printable invoice
//! POST /orders/{id}/items/{item}/cancel - Cancel an item
//! POST /orders/{id}/items/{item}/return - Request a return
//!
//! # Wallet
//! GET  /wallet                         - Balance and transactions
//! POST /wallet/topup                   - Start a top-up
//! POST /wallet/topup/verify            - Razorpay Checkout callback for top-ups
//!
//! # Account (requires auth)
//! GET  /account                        - Profile
//! POST /account/profile                - Update name and phone
//! GET  /account/password               - Change password form
//! POST /account/password               - Change password
//! GET  /account/addresses              - Address book
//! POST /account/addresses              - Add address
//! GET  /account/addresses/new          - New address form
//! GET  /account/addresses/{id}/edit    - Edit address form
//! POST /account/addresses/{id}         - Update address
//! POST /account/addresses/{id}/delete  - Delete address
//! POST /account/addresses/{id}/default - Make default
//!
//! # Auth
//! GET  /auth/login                     - Login page
//! POST /auth/login                     - Login action
//! GET  /auth/register                  - Register page
//! POST /auth/register                  - Register action (sends OTP)
//! GET  /auth/verify                    - OTP entry for registration
//! POST /auth/verify                    - Verify OTP and create the account
//! POST /auth/verify/resend             - Resend registration OTP
//! GET  /auth/forgot-password           - Forgot password page
//! POST /auth/forgot-password           - Send reset OTP
//! GET  /auth/reset/verify              - OTP entry for reset
//! POST /auth/reset/verify              - Verify reset OTP
//! POST /auth/reset/resend              - Resend reset OTP
//! GET  /auth/reset-password            - New password form
//! POST /auth/reset-password            - Set new password
//! POST /auth/logout                    - Logout action
//! GET  /auth/google                    - Redirect to Google
//! GET  /auth/google/callback           - Google OAuth callback
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod home;
pub mod orders;
pub mod wallet;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Deserialize;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

// =============================================================================
// Flash Messages
// =============================================================================

/// Query parameters for error/success display after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

impl MessageQuery {
    /// Resolve message codes to display text. Unknown codes are dropped.
    #[must_use]
    pub fn flash(&self) -> Flash {
        Flash {
            error: self.error.as_deref().and_then(error_text),
            success: self.success.as_deref().and_then(success_text),
        }
    }
}

/// Resolved messages for templates.
#[derive(Debug, Clone, Default)]
pub struct Flash {
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

impl Flash {
    #[must_use]
    pub const fn error(text: &'static str) -> Self {
        Self {
            error: Some(text),
            success: None,
        }
    }
}

fn error_text(code: &str) -> Option<&'static str> {
    Some(match code {
        "credentials" => "Incorrect email or password.",
        "blocked" => "Your account has been blocked. Please contact support.",
        "session" => "Your session expired. Please try again.",
        "email_taken" => "An account with this email already exists.",
        "invalid_email" => "Please enter a valid email address.",
        "password_too_short" => "Password must be at least 8 characters.",
        "password_mismatch" => "Passwords do not match.",
        "invalid_name" => "Please enter your name.",
        "invalid_phone" => "Phone number must be 10 digits.",
        "otp_invalid" => "That code is incorrect.",
        "otp_expired" => "That code has expired. Request a new one.",
        "otp_attempts" => "Too many wrong attempts. Request a new code.",
        "otp_cooldown" => "Please wait a minute before requesting another code.",
        "email_failed" => "We could not send the email. Please try again.",
        "google_unavailable" => "Google sign-in is not available right now.",
        "google_denied" => "Google sign-in was cancelled.",
        "invalid_state" => "Sign-in request expired. Please try again.",
        "google_failed" => "Google sign-in failed. Please try again.",
        "current_password" => "Your current password is incorrect.",
        "same_password" => "Choose a password different from the current one.",
        "invalid_address" => "Please fill in every required address field.",
        "address_not_found" => "Please choose a delivery address.",
        "empty_cart" => "Your cart is empty.",
        "unavailable" => "An item in your cart is no longer available.",
        "out_of_stock" => "An item in your cart does not have enough stock.",
        "insufficient_wallet" => "Your wallet balance is too low for this order.",
        "invalid_payment_method" => "Please choose a payment method.",
        "payment_failed" => "Payment failed. You can retry from this page.",
        "payment_unavailable" => "The payment service is unavailable. Please try again.",
        "coupon_invalid" => "That coupon code is not valid.",
        "coupon_inactive" => "This coupon is not active.",
        "coupon_expired" => "This coupon has expired.",
        "coupon_minimum" => "Your cart does not meet this coupon's minimum purchase.",
        "coupon_limit" => "You have already used this coupon the maximum number of times.",
        "coupon_applied" => "Remove the applied coupon before adding another.",
        "cannot_cancel" => "This item can no longer be cancelled.",
        "cannot_return" => "This item cannot be returned.",
        "return_window" => "The 7-day return window has closed.",
        "return_exists" => "A return was already requested for this item.",
        "invalid_reason" => "Please give a reason of at most 500 characters.",
        "invalid_amount" => "Enter an amount between ₹1 and ₹50,000.",
        _ => return None,
    })
}

fn success_text(code: &str) -> Option<&'static str> {
    Some(match code {
        "registered" => "Welcome to Threadly! Your account is ready.",
        "otp_sent" => "We sent a 6-digit code to your email.",
        "password_reset" => "Your password was reset. Please log in.",
        "password_changed" => "Your password was changed.",
        "profile_updated" => "Your profile was updated.",
        "address_saved" => "Address saved.",
        "address_deleted" => "Address deleted.",
        "coupon_applied" => "Coupon applied.",
        "coupon_removed" => "Coupon removed.",
        "item_cancelled" => "The item was cancelled.",
        "refunded" => "The item was cancelled and the refund added to your wallet.",
        "return_requested" => "Your return request was submitted.",
        "wallet_topped_up" => "Money added to your wallet.",
        "logged_out" => "You have been logged out.",
        _ => return None,
    })
}

// =============================================================================
// Routers
// =============================================================================

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/verify", post(auth::verify_signup))
        .route("/verify/resend", post(auth::resend_signup))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset/verify", post(auth::verify_reset))
        .route("/reset/resend", post(auth::resend_reset))
        .route("/reset-password", post(auth::reset_password))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/verify", get(auth::verify_signup_page))
        .route("/forgot-password", get(auth::forgot_password_page))
        .route("/reset/verify", get(auth::verify_reset_page))
        .route("/reset-password", get(auth::reset_password_page))
        .route("/logout", post(auth::logout))
        .route("/google", get(auth::google_login))
        .route("/google/callback", get(auth::google_callback))
        .merge(limited)
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .route("/coupon", post(cart::apply_coupon))
        .route("/coupon/remove", post(cart::remove_coupon))
        .layer(api_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::place_order))
        .route("/razorpay/verify", post(checkout::verify_payment))
        .layer(api_rate_limiter())
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/invoice", get(orders::invoice))
        .route("/{id}/pay", get(checkout::retry_payment))
        .route("/{id}/success", get(checkout::success))
        .route("/{id}/items/{item_id}/cancel", post(orders::cancel_item))
        .route("/{id}/items/{item_id}/return", post(orders::request_return))
}

/// Create the wallet routes router.
pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wallet::show))
        .route("/topup", post(wallet::start_topup))
        .route("/topup/verify", post(wallet::verify_topup))
        .layer(api_rate_limiter())
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/profile", post(account::update_profile))
        .route(
            "/password",
            get(account::password_page).post(account::change_password),
        )
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route("/addresses/new", get(account::new_address))
        .route("/addresses/{id}", post(account::update_address))
        .route("/addresses/{id}/edit", get(account::edit_address))
        .route("/addresses/{id}/delete", post(account::delete_address))
        .route("/addresses/{id}/default", post(account::set_default_address))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/shop", get(catalog::shop))
        .route("/products/{id}", get(catalog::product))
        .route("/coupons", get(cart::coupons))
        .route("/webhooks/razorpay", post(checkout::razorpay_webhook))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/wallet", wallet_routes())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_resolves_known_codes() {
        let query = MessageQuery {
            error: Some("credentials".to_string()),
            success: Some("otp_sent".to_string()),
        };
        let flash = query.flash();
        assert_eq!(flash.error, Some("Incorrect email or password."));
        assert_eq!(flash.success, Some("We sent a 6-digit code to your email."));
    }

    #[test]
    fn test_flash_drops_unknown_codes() {
        let query = MessageQuery {
            error: Some("<script>".to_string()),
            success: None,
        };
        assert!(query.flash().error.is_none());
    }
}
