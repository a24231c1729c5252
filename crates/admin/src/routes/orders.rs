//! Order list, detail and item actions.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use threadly_core::{OrderId, OrderItemId, OrderItemStatus};

use super::{AdminUserView, Flash, FlashKind, MessageQuery, Pagination, redirect_flash, render};
use crate::db::OrderRepository;
use crate::db::orders::OrderActionError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireAdminWrite};
use crate::models::{OrderDetail, OrderListItem};
use crate::state::AppState;

/// Longest reason given when rejecting a return.
pub const MAX_NOTE_LENGTH: usize = 500;

/// Order list query.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
}

impl OrdersQuery {
    /// The status filter, ignoring blanks and unknown values.
    #[must_use]
    pub fn status(&self) -> Option<OrderItemStatus> {
        self.status
            .as_deref()
            .and_then(|s| s.parse::<OrderItemStatus>().ok())
    }

    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Status change form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Return rejection form data.
#[derive(Debug, Deserialize)]
pub struct RejectForm {
    pub note: String,
}

/// Trimmed note of 1 to 500 characters.
///
/// # Errors
///
/// Returns the `invalid_note` flash code.
pub fn validate_note(note: &str) -> Result<&str, &'static str> {
    let note = note.trim();
    if note.is_empty() || note.chars().count() > MAX_NOTE_LENGTH {
        return Err("invalid_note");
    }
    Ok(note)
}

/// Flash code for a refused order action, or the error to propagate.
fn action_flash(err: OrderActionError, refused: &'static str) -> Result<&'static str, AppError> {
    match err {
        OrderActionError::Transition(e) => {
            tracing::info!(from = %e.from, to = %e.to, "Order item transition refused");
            Ok(refused)
        }
        OrderActionError::NoPendingReturn => Ok("no_pending_return"),
        other => Err(other.into()),
    }
}

/// Order list template.
#[derive(Template)]
#[template(path = "orders/index.html")]
pub struct OrdersTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub orders: Vec<OrderListItem>,
    pub statuses: [OrderItemStatus; 9],
    pub selected_status: String,
    pub search: String,
    pub pagination: Pagination,
}

impl OrdersTemplate {
    /// Query string that keeps the filters when paging.
    #[must_use]
    pub fn filter_query(&self) -> String {
        format!(
            "status={}&q={}",
            self.selected_status,
            self.search
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_'))
                .collect::<String>()
        )
    }
}

/// Order detail template.
#[derive(Template)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub order: OrderDetail,
    pub flash: Flash,
}

/// Order list with status filter and search.
#[instrument(skip(state, admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<OrdersQuery>,
) -> Result<Html<String>, AppError> {
    let status = query.status();
    let (page, offset) = Pagination::offset(query.page);
    let (orders, total) = OrderRepository::new(state.pool())
        .list(status, query.search(), super::PER_PAGE, offset)
        .await?;

    Ok(render(&OrdersTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/orders".to_string(),
        orders,
        statuses: OrderItemStatus::ALL,
        selected_status: status.map(|s| s.as_str().to_string()).unwrap_or_default(),
        search: query.search().unwrap_or_default().to_string(),
        pagination: Pagination::new(page, total),
    }))
}

/// Order detail with item histories and return records.
#[instrument(skip(state, admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let order = OrderRepository::new(state.pool())
        .get(OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    Ok(render(&OrderShowTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/orders".to_string(),
        order,
        flash: query.flash(),
    }))
}

/// Move an item along the shipping path.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path((id, item_id)): Path<(i32, i32)>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect, AppError> {
    let back = format!("/admin/orders/{id}");
    let Ok(to) = form.status.parse::<OrderItemStatus>() else {
        return Ok(redirect_flash(&back, FlashKind::Error, "invalid_status"));
    };

    match OrderRepository::new(state.pool())
        .update_item_status(OrderItemId::new(item_id), to)
        .await
    {
        Ok(()) => {
            tracing::info!(order_id = id, item_id, status = %to, "Order item status updated");
            Ok(redirect_flash(&back, FlashKind::Success, "status_updated"))
        }
        Err(e) => Ok(redirect_flash(
            &back,
            FlashKind::Error,
            action_flash(e, "invalid_status")?,
        )),
    }
}

/// Cancel an item on the store's side.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn cancel_item(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path((id, item_id)): Path<(i32, i32)>,
) -> Result<Redirect, AppError> {
    let back = format!("/admin/orders/{id}");

    match OrderRepository::new(state.pool())
        .cancel_item(OrderItemId::new(item_id))
        .await
    {
        Ok(refund) => {
            tracing::info!(order_id = id, item_id, %refund, "Order item cancelled by admin");
            Ok(redirect_flash(&back, FlashKind::Success, "item_cancelled"))
        }
        Err(e) => Ok(redirect_flash(
            &back,
            FlashKind::Error,
            action_flash(e, "cannot_cancel")?,
        )),
    }
}

/// Approve a return and refund the item to the customer's wallet.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn approve_return(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path((id, item_id)): Path<(i32, i32)>,
) -> Result<Redirect, AppError> {
    let back = format!("/admin/orders/{id}");

    match OrderRepository::new(state.pool())
        .approve_return(OrderItemId::new(item_id))
        .await
    {
        Ok(refund) => {
            tracing::info!(order_id = id, item_id, %refund, "Return approved");
            Ok(redirect_flash(&back, FlashKind::Success, "return_approved"))
        }
        Err(e) => Ok(redirect_flash(
            &back,
            FlashKind::Error,
            action_flash(e, "no_pending_return")?,
        )),
    }
}

/// Reject a return with a note for the customer.
#[instrument(skip(state, admin, form), fields(admin_id = %admin.id))]
pub async fn reject_return(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path((id, item_id)): Path<(i32, i32)>,
    Form(form): Form<RejectForm>,
) -> Result<Redirect, AppError> {
    let back = format!("/admin/orders/{id}");
    let note = match validate_note(&form.note) {
        Ok(note) => note,
        Err(code) => return Ok(redirect_flash(&back, FlashKind::Error, code)),
    };

    match OrderRepository::new(state.pool())
        .reject_return(OrderItemId::new(item_id), note)
        .await
    {
        Ok(()) => {
            tracing::info!(order_id = id, item_id, "Return rejected");
            Ok(redirect_flash(&back, FlashKind::Success, "return_rejected"))
        }
        Err(e) => Ok(redirect_flash(
            &back,
            FlashKind::Error,
            action_flash(e, "no_pending_return")?,
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadly_core::lifecycle::TransitionError;

    use super::*;

    #[test]
    fn test_status_filter_ignores_unknown() {
        let query = OrdersQuery {
            status: Some("shipped".to_string()),
            ..Default::default()
        };
        assert_eq!(query.status(), Some(OrderItemStatus::Shipped));

        let query = OrdersQuery {
            status: Some(String::new()),
            q: Some("  ".to_string()),
            page: None,
        };
        assert_eq!(query.status(), None);
        assert_eq!(query.search(), None);
    }

    #[test]
    fn test_validate_note() {
        assert_eq!(validate_note("  worn item "), Ok("worn item"));
        assert_eq!(validate_note(" "), Err("invalid_note"));
        assert_eq!(validate_note(&"n".repeat(501)), Err("invalid_note"));
    }

    #[test]
    fn test_action_flash() {
        let refused = OrderActionError::Transition(TransitionError {
            from: OrderItemStatus::Delivered,
            to: OrderItemStatus::Cancelled,
        });
        assert_eq!(action_flash(refused, "cannot_cancel").unwrap(), "cannot_cancel");
        assert_eq!(
            action_flash(OrderActionError::NoPendingReturn, "x").unwrap(),
            "no_pending_return"
        );
        assert!(action_flash(OrderActionError::NotFound, "x").is_err());
    }
}
