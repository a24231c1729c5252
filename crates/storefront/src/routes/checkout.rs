//! Checkout, Razorpay payment and webhook handlers.
//!
//! COD and wallet orders are complete once placed. Razorpay orders are
//! placed `payment_pending`, then the payment page opens Razorpay Checkout
//! for a gateway order. Checkout posts the signed result back to
//! `/checkout/razorpay/verify`; the webhook confirms the same payment
//! server-to-server, and whichever arrives second is a no-op.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use threadly_core::{AddressId, OrderId, PaymentMethod, to_paise};

use crate::db::{AddressRepository, OrderRepository, SettingsRepository, WalletRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::models::{Address, CurrentUser, Order};
use crate::routes::{Flash, MessageQuery};
use crate::routes::cart::{CartView, load_cart_view};
use crate::services::checkout::{self, CheckoutError, price_cart};
use crate::services::razorpay::{RazorpayError, WebhookEvent};
use crate::state::AppState;

/// Everything the Razorpay Checkout launcher needs.
#[derive(Debug, Clone)]
pub struct RazorpayLaunch {
    pub key_id: String,
    pub gateway_order_id: String,
    pub amount_paise: i64,
    pub description: String,
    pub prefill_name: String,
    pub prefill_email: String,
    /// Form action receiving the signed payment result.
    pub verify_url: String,
    /// Where to go when the customer closes the dialog.
    pub cancel_url: String,
}

/// Razorpay payment page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/pay.html")]
pub struct PayTemplate {
    pub title: String,
    pub amount: Decimal,
    pub launch: RazorpayLaunch,
    pub nonce: String,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub view: CartView,
    pub addresses: Vec<Address>,
    pub selected: Option<AddressId>,
    pub wallet_balance: Decimal,
    pub flash: Flash,
    pub nonce: String,
}

impl CheckoutTemplate {
    fn is_selected(&self, id: &AddressId) -> bool {
        self.selected == Some(*id)
    }

    fn wallet_enabled(&self) -> bool {
        self.wallet_balance >= self.view.totals.final_amount
    }
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct SuccessTemplate {
    pub order: Order,
    pub nonce: String,
}

/// Checkout page query.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutQuery {
    pub address: Option<i32>,
    pub error: Option<String>,
}

/// Place order form data.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderForm {
    pub address_id: i32,
    pub payment_method: String,
}

/// Razorpay Checkout result. Failed payments post only the order id.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentForm {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

impl VerifyPaymentForm {
    /// Payment id and signature when both were posted.
    fn signed(&self) -> Option<(&str, &str)> {
        let payment_id = self.razorpay_payment_id.as_deref().filter(|s| !s.is_empty())?;
        let signature = self.razorpay_signature.as_deref().filter(|s| !s.is_empty())?;
        Some((payment_id, signature))
    }
}

/// Flash code for a refused checkout.
const fn checkout_error_code(e: &CheckoutError) -> Option<&'static str> {
    match e {
        CheckoutError::EmptyCart => Some("empty_cart"),
        CheckoutError::Unavailable(_) => Some("unavailable"),
        CheckoutError::OutOfStock(_) => Some("out_of_stock"),
        CheckoutError::InsufficientWallet => Some("insufficient_wallet"),
        CheckoutError::AddressNotFound => Some("address_not_found"),
        CheckoutError::Repository(_) => None,
    }
}

/// Build the launcher for an order's gateway order.
fn launch_for_order(
    state: &AppState,
    user: &CurrentUser,
    order_id: OrderId,
    order_number: &str,
    gateway_order_id: String,
    amount: Decimal,
) -> Result<RazorpayLaunch, AppError> {
    let amount_paise = to_paise(amount).ok_or(RazorpayError::InvalidAmount(amount))?;
    Ok(RazorpayLaunch {
        key_id: state.razorpay().key_id().to_string(),
        gateway_order_id,
        amount_paise,
        description: format!("Order {order_number}"),
        prefill_name: user.name.clone(),
        prefill_email: user.email.to_string(),
        verify_url: "/checkout/razorpay/verify".to_string(),
        cancel_url: format!("/orders/{order_id}"),
    })
}

/// Open a gateway order for an order and render the payment page.
async fn start_payment(
    state: &AppState,
    user: &CurrentUser,
    order_id: OrderId,
    order_number: &str,
    amount: Decimal,
    nonce: String,
) -> Result<Response, AppError> {
    let gateway = match state.razorpay().create_order(amount, order_number).await {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!(%order_number, error = %e, "Could not open Razorpay order");
            return Ok(
                Redirect::to(&format!("/orders/{order_id}?error=payment_unavailable"))
                    .into_response(),
            );
        }
    };

    OrderRepository::new(state.pool())
        .attach_razorpay_order(order_id, &gateway.id)
        .await?;

    let launch = launch_for_order(state, user, order_id, order_number, gateway.id, amount)?;
    Ok(PayTemplate {
        title: format!("Pay for order {order_number}"),
        amount,
        launch,
        nonce,
    }
    .into_response())
}

/// Display the checkout page.
#[instrument(skip(state, nonce))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Query(query): Query<CheckoutQuery>,
) -> Result<Response, AppError> {
    let mut view = load_cart_view(&state, user.id).await?;
    if view.cart.is_empty() {
        return Ok(Redirect::to("/cart?error=empty_cart").into_response());
    }

    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    let selected = query
        .address
        .map(AddressId::new)
        .and_then(|id| addresses.iter().find(|a| a.id == id))
        .or_else(|| addresses.iter().find(|a| a.is_default))
        .or_else(|| addresses.first());

    // Delivery depends on the chosen address, not only the default one.
    if let Some(address) = selected {
        let delivery = SettingsRepository::new(state.pool())
            .delivery()
            .await?;
        view.totals = price_cart(&view.cart, view.totals.discount, &delivery, address.location);
    }
    let selected = selected.map(|a| a.id);

    let wallet_balance = WalletRepository::new(state.pool())
        .get(user.id)
        .await?
        .balance;

    let flash = MessageQuery {
        error: query.error,
        success: None,
    }
    .flash();

    Ok(CheckoutTemplate {
        view,
        addresses,
        selected,
        wallet_balance,
        flash,
        nonce,
    }
    .into_response())
}

/// Place the order.
#[instrument(skip(state, nonce))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Form(form): Form<PlaceOrderForm>,
) -> Result<Response, AppError> {
    let Ok(method) = form.payment_method.parse::<PaymentMethod>() else {
        return Ok(Redirect::to("/checkout?error=invalid_payment_method").into_response());
    };

    let outcome = match checkout::place_order(
        state.pool(),
        user.id,
        AddressId::new(form.address_id),
        method,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            let Some(code) = checkout_error_code(&e) else {
                return Err(AppError::Internal(e.to_string()));
            };
            tracing::info!(user_id = %user.id, error = %e, "Checkout refused");
            return Ok(Redirect::to(&format!("/checkout?error={code}")).into_response());
        }
    };

    if outcome.coupon_dropped {
        tracing::info!(order_number = %outcome.order.order_number, "Order placed without its expired coupon");
    }

    match outcome.payment_method {
        PaymentMethod::Razorpay => {
            start_payment(
                &state,
                &user,
                outcome.order.id,
                &outcome.order.order_number,
                outcome.totals.final_amount,
                nonce,
            )
            .await
        }
        PaymentMethod::Cod | PaymentMethod::Wallet => {
            Ok(Redirect::to(&format!("/orders/{}/success", outcome.order.id)).into_response())
        }
    }
}

/// Razorpay Checkout callback for orders.
///
/// A valid signature confirms the payment. A missing or invalid one marks
/// the payment failed; the customer can retry from the order page.
#[instrument(skip(state, form), fields(razorpay_order_id = %form.razorpay_order_id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<VerifyPaymentForm>,
) -> Result<Redirect, AppError> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .find_by_razorpay_order(&form.razorpay_order_id)
        .await?
        .filter(|o| o.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    let verified = form.signed().and_then(|(payment_id, signature)| {
        state
            .razorpay()
            .verify_payment_signature(&form.razorpay_order_id, payment_id, signature)
            .ok()
            .map(|()| payment_id)
    });

    if let Some(payment_id) = verified {
        if orders.confirm_payment(order.id, payment_id).await? {
            tracing::info!(order_number = %order.order_number, %payment_id, "Payment confirmed");
        }
        return Ok(Redirect::to(&format!("/orders/{}/success", order.id)));
    }

    tracing::warn!(order_number = %order.order_number, "Payment failed or signature invalid");
    orders.fail_payment(order.id).await?;
    Ok(Redirect::to(&format!(
        "/orders/{}?error=payment_failed",
        order.id
    )))
}

/// Retry the online payment of a pending or failed order.
#[instrument(skip(state, nonce))]
pub async fn retry_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(user.id, OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if !order.awaiting_payment() {
        return Ok(Redirect::to(&format!("/orders/{}", order.id)).into_response());
    }

    start_payment(
        &state,
        &user,
        order.id,
        &order.order_number,
        order.final_amount,
        nonce,
    )
    .await
}

/// Order confirmation page.
#[instrument(skip(state, nonce))]
pub async fn success(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Path(id): Path<i32>,
) -> Result<SuccessTemplate, AppError> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(user.id, OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    Ok(SuccessTemplate { order, nonce })
}

/// Razorpay webhook.
///
/// `payment.captured` confirms an order payment or completes a wallet
/// top-up; `payment.failed` marks an order payment failed. Other events are
/// acknowledged and ignored.
#[instrument(skip_all)]
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get("x-razorpay-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing signature".to_string()))?;

    match state.razorpay().verify_webhook_signature(&body, signature) {
        Ok(()) => {}
        Err(RazorpayError::WebhookNotConfigured) => {
            tracing::warn!("Razorpay webhook received but no webhook secret is configured");
            return Ok(StatusCode::SERVICE_UNAVAILABLE);
        }
        Err(e) => return Err(e.into()),
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    let Some(payment) = event.payment() else {
        tracing::debug!(event = %event.event, "Ignoring webhook without payment");
        return Ok(StatusCode::OK);
    };
    let Some(gateway_order_id) = payment.order_id.as_deref() else {
        return Ok(StatusCode::OK);
    };

    let orders = OrderRepository::new(state.pool());
    match event.event.as_str() {
        "payment.captured" => {
            if let Some(order) = orders.find_by_razorpay_order(gateway_order_id).await? {
                if orders.confirm_payment(order.id, &payment.id).await? {
                    tracing::info!(order_number = %order.order_number, "Payment confirmed by webhook");
                }
            } else if let Some(topup) = WalletRepository::new(state.pool())
                .complete_topup(gateway_order_id, None, &payment.id)
                .await?
            {
                tracing::info!(user_id = %topup.user_id, amount = %topup.amount, "Wallet top-up completed by webhook");
            }
        }
        "payment.failed" => {
            if let Some(order) = orders.find_by_razorpay_order(gateway_order_id).await?
                && orders.fail_payment(order.id).await?
            {
                tracing::info!(order_number = %order.order_number, "Payment failed by webhook");
            }
        }
        other => tracing::debug!(event = other, "Ignoring webhook event"),
    }

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_errors_map_to_messages() {
        let errors = [
            CheckoutError::EmptyCart,
            CheckoutError::Unavailable("Linen Shirt".to_string()),
            CheckoutError::OutOfStock("Linen Shirt".to_string()),
            CheckoutError::InsufficientWallet,
            CheckoutError::AddressNotFound,
        ];
        for e in &errors {
            let code = checkout_error_code(e).unwrap_or_default();
            let query = MessageQuery {
                error: Some(code.to_string()),
                success: None,
            };
            assert!(query.flash().error.is_some(), "no message for {e}");
        }
    }

    #[test]
    fn test_verify_form_requires_payment_id_and_signature() {
        let failed = VerifyPaymentForm {
            razorpay_order_id: "order_1".to_string(),
            razorpay_payment_id: None,
            razorpay_signature: None,
        };
        assert!(failed.signed().is_none());

        let blank = VerifyPaymentForm {
            razorpay_order_id: "order_1".to_string(),
            razorpay_payment_id: Some("pay_1".to_string()),
            razorpay_signature: Some(String::new()),
        };
        assert!(blank.signed().is_none());

        let signed = VerifyPaymentForm {
            razorpay_order_id: "order_1".to_string(),
            razorpay_payment_id: Some("pay_1".to_string()),
            razorpay_signature: Some("abc".to_string()),
        };
        assert_eq!(signed.signed(), Some(("pay_1", "abc")));
    }
}
