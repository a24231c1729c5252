//! Customer list and blocking.

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use tracing::instrument;

use threadly_core::UserId;

use super::{AdminUserView, Flash, FlashKind, ListQuery, Pagination, redirect_flash, render};
use crate::db::CustomerRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireAdminWrite};
use crate::models::Customer;
use crate::state::AppState;

/// Customer list template.
#[derive(Template)]
#[template(path = "customers/index.html")]
pub struct CustomersTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub customers: Vec<Customer>,
    pub search: String,
    pub pagination: Pagination,
    pub flash: Flash,
}

/// Customer list with search.
#[instrument(skip(state, admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>, AppError> {
    let (page, offset) = Pagination::offset(query.page);
    let (customers, total) = CustomerRepository::new(state.pool())
        .list(query.search(), super::PER_PAGE, offset)
        .await?;

    Ok(render(&CustomersTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/customers".to_string(),
        customers,
        search: query.search().unwrap_or_default().to_string(),
        pagination: Pagination::new(page, total),
        flash: query.flash(),
    }))
}

/// Block a customer. The storefront signs them out on their next request.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn block(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    CustomerRepository::new(state.pool())
        .set_blocked(UserId::new(id), true)
        .await?;
    tracing::info!(user_id = id, "Customer blocked");

    Ok(redirect_flash(
        "/admin/customers",
        FlashKind::Success,
        "customer_blocked",
    ))
}

/// Unblock a customer.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn unblock(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    CustomerRepository::new(state.pool())
        .set_blocked(UserId::new(id), false)
        .await?;
    tracing::info!(user_id = id, "Customer unblocked");

    Ok(redirect_flash(
        "/admin/customers",
        FlashKind::Success,
        "customer_unblocked",
    ))
}
