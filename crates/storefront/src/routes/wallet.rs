//! Wallet page and Razorpay top-ups.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use threadly_core::{round_money, to_paise};

use crate::db::WalletRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::models::WalletTransaction;
use crate::routes::checkout::{PayTemplate, RazorpayLaunch};
use crate::routes::{Flash, MessageQuery};
use crate::services::razorpay::RazorpayError;
use crate::state::AppState;

/// Transactions per wallet page.
const TRANSACTIONS_PER_PAGE: i64 = 20;

/// Smallest top-up in rupees.
pub const MIN_TOPUP: i64 = 1;

/// Largest top-up in rupees.
pub const MAX_TOPUP: i64 = 50_000;

/// Wallet page query.
#[derive(Debug, Default, Deserialize)]
pub struct WalletQuery {
    pub page: Option<i64>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Top-up form data.
#[derive(Debug, Deserialize)]
pub struct TopupForm {
    pub amount: String,
}

/// Razorpay Checkout result for a top-up.
#[derive(Debug, Deserialize)]
pub struct VerifyTopupForm {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

/// Wallet page template.
#[derive(Template, WebTemplate)]
#[template(path = "wallet/show.html")]
pub struct WalletTemplate {
    pub balance: Decimal,
    pub transactions: Vec<WalletTransaction>,
    pub page: i64,
    pub total_pages: i64,
    pub flash: Flash,
    pub nonce: String,
}

/// Parse a top-up amount. `None` unless it is from ₹1 to ₹50,000.
#[must_use]
pub fn parse_topup_amount(raw: &str) -> Option<Decimal> {
    let amount = round_money(raw.trim().parse::<Decimal>().ok()?);
    (amount >= Decimal::from(MIN_TOPUP) && amount <= Decimal::from(MAX_TOPUP)).then_some(amount)
}

/// Wallet balance and transactions.
#[instrument(skip(state, nonce))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Query(query): Query<WalletQuery>,
) -> Result<WalletTemplate, AppError> {
    let wallets = WalletRepository::new(state.pool());
    let (page, offset) = threadly_core::page_offset(query.page, TRANSACTIONS_PER_PAGE);

    let balance = wallets.get(user.id).await?.balance;
    let transactions = wallets
        .transactions(user.id, TRANSACTIONS_PER_PAGE, offset)
        .await?;
    let total = wallets.transaction_count(user.id).await?;
    let total_pages = threadly_core::total_pages(total, TRANSACTIONS_PER_PAGE);

    let flash = MessageQuery {
        error: query.error,
        success: query.success,
    }
    .flash();

    Ok(WalletTemplate {
        balance,
        transactions,
        page,
        total_pages,
        flash,
        nonce,
    })
}

/// Open a Razorpay order for a top-up and render the payment page.
#[instrument(skip(state, nonce))]
pub async fn start_topup(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Form(form): Form<TopupForm>,
) -> Result<Response, AppError> {
    let Some(amount) = parse_topup_amount(&form.amount) else {
        return Ok(Redirect::to("/wallet?error=invalid_amount").into_response());
    };

    let receipt = format!("wallet-{}-{}", user.id, Utc::now().timestamp());
    let gateway = match state.razorpay().create_order(amount, &receipt).await {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Could not open Razorpay top-up order");
            return Ok(Redirect::to("/wallet?error=payment_unavailable").into_response());
        }
    };

    WalletRepository::new(state.pool())
        .create_topup(&gateway.id, user.id, amount)
        .await?;

    let amount_paise = to_paise(amount).ok_or(RazorpayError::InvalidAmount(amount))?;
    Ok(PayTemplate {
        title: "Add money to wallet".to_string(),
        amount,
        launch: RazorpayLaunch {
            key_id: state.razorpay().key_id().to_string(),
            gateway_order_id: gateway.id,
            amount_paise,
            description: "Wallet top-up".to_string(),
            prefill_name: user.name.clone(),
            prefill_email: user.email.to_string(),
            verify_url: "/wallet/topup/verify".to_string(),
            cancel_url: "/wallet".to_string(),
        },
        nonce,
    }
    .into_response())
}

/// Razorpay Checkout callback for top-ups.
///
/// The credit is keyed on the payment id, so a callback racing the webhook
/// credits once.
#[instrument(skip(state, form), fields(razorpay_order_id = %form.razorpay_order_id))]
pub async fn verify_topup(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<VerifyTopupForm>,
) -> Result<Redirect, AppError> {
    let (Some(payment_id), Some(signature)) = (
        form.razorpay_payment_id.as_deref().filter(|s| !s.is_empty()),
        form.razorpay_signature.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return Ok(Redirect::to("/wallet?error=payment_failed"));
    };

    if state
        .razorpay()
        .verify_payment_signature(&form.razorpay_order_id, payment_id, signature)
        .is_err()
    {
        tracing::warn!(user_id = %user.id, "Top-up signature invalid");
        return Ok(Redirect::to("/wallet?error=payment_failed"));
    }

    if let Some(topup) = WalletRepository::new(state.pool())
        .complete_topup(&form.razorpay_order_id, Some(user.id), payment_id)
        .await?
    {
        tracing::info!(user_id = %user.id, amount = %topup.amount, "Wallet topped up");
    }

    Ok(Redirect::to("/wallet?success=wallet_topped_up"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topup_amount_bounds() {
        assert_eq!(parse_topup_amount("1"), Some(Decimal::from(1)));
        assert_eq!(parse_topup_amount("50000"), Some(Decimal::from(50_000)));
        assert_eq!(parse_topup_amount("0.99"), None);
        assert_eq!(parse_topup_amount("50000.01"), None);
    }

    #[test]
    fn test_topup_amount_rejects_garbage() {
        assert_eq!(parse_topup_amount(""), None);
        assert_eq!(parse_topup_amount("ten"), None);
        assert_eq!(parse_topup_amount("-100"), None);
    }

    #[test]
    fn test_topup_amount_trims_and_rounds() {
        assert_eq!(
            parse_topup_amount(" 250.005 ").map(|d| d.to_string()),
            Some("250.01".to_string())
        );
    }
}
