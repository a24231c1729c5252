//! Order history, detail, invoice and item actions.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use threadly_core::lifecycle::TransitionError;
use threadly_core::{OrderId, OrderItemId, OrderItemStatus, UserId};

use crate::db::OrderRepository;
use crate::db::orders::OrderActionError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::models::{Order, OrderSummary};
use crate::routes::{Flash, MessageQuery};
use crate::state::AppState;

/// Orders per history page.
const ORDERS_PER_PAGE: i64 = 10;

/// Longest accepted return reason, in characters.
pub const MAX_RETURN_REASON: usize = 500;

/// Order history query.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub page: Option<i64>,
}

/// Return request form data.
#[derive(Debug, Deserialize)]
pub struct ReturnForm {
    pub reason: String,
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersTemplate {
    pub orders: Vec<OrderSummary>,
    pub page: i64,
    pub total_pages: i64,
    pub nonce: String,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub order: Order,
    pub now: DateTime<Utc>,
    pub flash: Flash,
    pub nonce: String,
}

/// Printable invoice template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/invoice.html")]
pub struct InvoiceTemplate {
    pub order: Order,
    pub customer_name: String,
    pub customer_email: String,
}

/// Validate a return reason: required, at most 500 characters.
///
/// # Errors
///
/// Returns the flash code to show when the reason is refused.
pub fn validate_return_reason(reason: &str) -> Result<&str, &'static str> {
    let reason = reason.trim();
    if reason.is_empty() || reason.chars().count() > MAX_RETURN_REASON {
        return Err("invalid_reason");
    }
    Ok(reason)
}

async fn load_order(state: &AppState, user_id: UserId, id: i32) -> Result<Order, AppError> {
    OrderRepository::new(state.pool())
        .get_for_user(user_id, OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// Order history.
#[instrument(skip(state, nonce))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Query(query): Query<OrdersQuery>,
) -> Result<OrdersTemplate, AppError> {
    let (page, offset) = threadly_core::page_offset(query.page, ORDERS_PER_PAGE);
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_user(user.id, ORDERS_PER_PAGE, offset)
        .await?;
    let total_pages = threadly_core::total_pages(total, ORDERS_PER_PAGE);

    Ok(OrdersTemplate {
        orders,
        page,
        total_pages,
        nonce,
    })
}

/// Order detail with item histories and return records.
#[instrument(skip(state, nonce))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<OrderShowTemplate, AppError> {
    let order = load_order(&state, user.id, id).await?;
    Ok(OrderShowTemplate {
        order,
        now: Utc::now(),
        flash: query.flash(),
        nonce,
    })
}

/// Printable invoice.
#[instrument(skip(state))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<InvoiceTemplate, AppError> {
    let order = load_order(&state, user.id, id).await?;
    Ok(InvoiceTemplate {
        order,
        customer_name: user.name,
        customer_email: user.email.into_inner(),
    })
}

/// Cancel one item of an order.
#[instrument(skip(state))]
pub async fn cancel_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((id, item_id)): Path<(i32, i32)>,
) -> Result<Redirect, AppError> {
    let result = OrderRepository::new(state.pool())
        .cancel_item(user.id, OrderItemId::new(item_id))
        .await;

    let code = match result {
        Ok(refund) if refund.is_zero() => "success=item_cancelled",
        Ok(refund) => {
            tracing::info!(user_id = %user.id, item_id, %refund, "Item cancelled with refund");
            "success=refunded"
        }
        Err(e) => action_error_code(e)?,
    };
    Ok(Redirect::to(&format!("/orders/{id}?{code}")))
}

/// Request a return for a delivered item.
#[instrument(skip(state, form))]
pub async fn request_return(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((id, item_id)): Path<(i32, i32)>,
    Form(form): Form<ReturnForm>,
) -> Result<Redirect, AppError> {
    let reason = match validate_return_reason(&form.reason) {
        Ok(reason) => reason,
        Err(code) => return Ok(Redirect::to(&format!("/orders/{id}?error={code}"))),
    };

    let result = OrderRepository::new(state.pool())
        .request_return(user.id, OrderItemId::new(item_id), reason, Utc::now())
        .await;

    let code = match result {
        Ok(()) => {
            tracing::info!(user_id = %user.id, item_id, "Return requested");
            "success=return_requested"
        }
        Err(e) => action_error_code(e)?,
    };
    Ok(Redirect::to(&format!("/orders/{id}?{code}")))
}

/// Query fragment for a refused item action. Storage errors propagate.
fn action_error_code(e: OrderActionError) -> Result<&'static str, AppError> {
    Ok(match e {
        OrderActionError::NotFound => {
            return Err(AppError::NotFound("Order item not found".to_string()));
        }
        OrderActionError::Transition(TransitionError {
            to: OrderItemStatus::ReturnRequested,
            ..
        }) => "error=cannot_return",
        OrderActionError::Transition(_) => "error=cannot_cancel",
        OrderActionError::ReturnWindowClosed => "error=return_window",
        OrderActionError::ReturnExists => "error=return_exists",
        OrderActionError::Repository(e) => return Err(e.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_reason_is_required() {
        assert_eq!(validate_return_reason("   "), Err("invalid_reason"));
    }

    #[test]
    fn test_return_reason_length_limit() {
        let long = "a".repeat(MAX_RETURN_REASON + 1);
        assert_eq!(validate_return_reason(&long), Err("invalid_reason"));

        let exact = "é".repeat(MAX_RETURN_REASON);
        assert!(validate_return_reason(&exact).is_ok());
    }

    #[test]
    fn test_return_reason_is_trimmed() {
        assert_eq!(validate_return_reason("  Too small  "), Ok("Too small"));
    }
}
