//! HTTP route handlers for admin.
//!
//! Everything here is nested under `/admin` by the binary.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! GET  /auth/login                        - Login page
//! POST /auth/login                        - Login action
//! POST /auth/logout                       - Logout
//!
//! # Dashboard & reports
//! GET  /                                  - Metrics, sales chart, top sellers (?period=)
//! GET  /reports                           - Sales report (?period=&start=&end=)
//! GET  /reports/export.csv                - Report as CSV attachment
//! GET  /reports/export.pdf                - Report as PDF attachment
//!
//! # Catalog
//! GET  /categories                        - Category list
//! POST /categories                        - Create category
//! GET  /categories/new                    - New category form
//! GET  /categories/{id}/edit              - Edit category form
//! POST /categories/{id}                   - Update category
//! POST /categories/{id}/toggle            - List/unlist
//! GET  /brands                            - Brand list
//! POST /brands                            - Create brand
//! GET  /brands/{id}/edit                  - Edit brand form
//! POST /brands/{id}                       - Update brand
//! POST /brands/{id}/toggle                - List/unlist
//! GET  /products                          - Product list (?q=&page=)
//! POST /products                          - Create product (multipart)
//! GET  /products/new                      - New product form
//! GET  /products/{id}/edit                - Edit product form
//! POST /products/{id}                     - Update product (multipart)
//! POST /products/{id}/toggle              - List/unlist
//! POST /products/{id}/images/remove       - Remove one image
//!
//! # Customers
//! GET  /customers                         - Customer list (?q=&page=)
//! POST /customers/{id}/block              - Block
//! POST /customers/{id}/unblock            - Unblock
//!
//! # Coupons
//! GET  /coupons                           - Coupon list
//! POST /coupons                           - Create coupon
//! GET  /coupons/new                       - New coupon form
//! GET  /coupons/{id}/edit                 - Edit coupon form
//! POST /coupons/{id}                      - Update coupon
//! POST /coupons/{id}/delete               - Delete coupon
//!
//! # Orders
//! GET  /orders                            - Order list (?status=&q=&page=)
//! GET  /orders/{id}                       - Order detail
//! POST /orders/{id}/items/{item}/status   - Move an item along the shipping path
//! POST /orders/{id}/items/{item}/cancel   - Cancel an item
//! POST /orders/{id}/items/{item}/return/approve - Approve a return
//! POST /orders/{id}/items/{item}/return/reject  - Reject a return
//!
//! # Settings
//! GET  /settings                          - Delivery charge settings
//! POST /settings                          - Update delivery charge settings
//! ```

pub mod auth;
pub mod brands;
pub mod categories;
pub mod coupons;
pub mod customers;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reports;
pub mod settings;

use askama::Template;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::{Html, Redirect},
    routing::{get, post},
};
use serde::Deserialize;

use crate::models::{AdminRole, CurrentAdmin};
use crate::services::media::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Rows per list page.
pub const PER_PAGE: i64 = 20;

/// Most images accepted in one product form.
pub const MAX_IMAGES_PER_UPLOAD: usize = 6;

// =============================================================================
// Template Helpers
// =============================================================================

/// Admin user view for the layout.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub email: String,
    pub role: String,
    pub can_write: bool,
    pub is_super_admin: bool,
}

impl From<&CurrentAdmin> for AdminUserView {
    fn from(admin: &CurrentAdmin) -> Self {
        Self {
            name: admin.name.clone(),
            email: admin.email.to_string(),
            role: admin.role.to_string(),
            can_write: admin.can_write(),
            is_super_admin: admin.role == AdminRole::SuperAdmin,
        }
    }
}

/// Render a template, logging failures instead of surfacing them.
pub fn render<T: Template>(template: &T) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}

/// Redirect after a POST, carrying a flash code.
#[must_use]
pub fn redirect_flash(path: &str, kind: FlashKind, code: &str) -> Redirect {
    let separator = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{path}{separator}{}={code}", kind.as_str()))
}

/// Which side of [`MessageQuery`] a code goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Error,
    Success,
}

impl FlashKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

/// Page number and count for list footers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
}

impl Pagination {
    /// Clamp a requested page (1-based) and return it with its row offset.
    #[must_use]
    pub fn offset(page: Option<i64>) -> (i64, i64) {
        threadly_core::page_offset(page, PER_PAGE)
    }

    #[must_use]
    pub fn new(page: i64, total: i64) -> Self {
        Self {
            page,
            total_pages: threadly_core::total_pages(total, PER_PAGE),
            total,
        }
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Search and page query shared by the list pages.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl ListQuery {
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    #[must_use]
    pub fn flash(&self) -> Flash {
        MessageQuery {
            error: self.error.clone(),
            success: self.success.clone(),
        }
        .flash()
    }
}

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

fn error_text(code: &str) -> Option<&'static str> {
    Some(match code {
        "credentials" => "Incorrect email or password.",
        "session" => "Your session expired. Please sign in again.",
        "invalid_name" => "Please enter a name of at most 100 characters.",
        "name_taken" => "That name is already in use.",
        "invalid_offer" => "Offer must be a whole percent between 0 and 90.",
        "invalid_price" => "Price must be greater than zero.",
        "invalid_category" => "Please choose a category.",
        "invalid_brand" => "Please choose a brand.",
        "invalid_sizes" => "Give every size a label and a stock of zero or more.",
        "image_required" => "A product needs at least one image.",
        "image_invalid" => "Images must be JPEG, PNG or WebP and at most 5 MB.",
        "too_many_images" => "Upload at most 6 images at a time.",
        "upload_unavailable" => "Image uploads are not configured.",
        "upload_failed" => "The image upload failed. Please try again.",
        "last_image" => "A product must keep at least one image.",
        "invalid_code" => "Coupon codes are 3 to 20 letters, digits, dashes or underscores.",
        "code_taken" => "A coupon with this code already exists.",
        "invalid_value" => "Please enter a valid discount value.",
        "invalid_percentage" => "Percentage discounts must be between 1 and 90.",
        "flat_exceeds_minimum" => "A flat discount must be less than the minimum purchase.",
        "invalid_minimum" => "Minimum purchase cannot be negative.",
        "invalid_max_discount" => "Maximum discount must be greater than zero.",
        "invalid_usage" => "Usage limit must be at least 1.",
        "invalid_expiry" => "Please enter a valid expiry date.",
        "expiry_past" => "Expiry must be in the future.",
        "invalid_status" => "That status change is not allowed.",
        "cannot_cancel" => "This item can no longer be cancelled.",
        "no_pending_return" => "There is no return waiting for a decision.",
        "invalid_note" => "Please give a reason of at most 500 characters.",
        "invalid_delivery" => "Charges must be zero or more.",
        "invalid_location" => "Enter both latitude and longitude, or neither.",
        "invalid_range" => "Please choose a valid date range.",
        _ => return None,
    })
}

fn success_text(code: &str) -> Option<&'static str> {
    Some(match code {
        "logged_out" => "You have been signed out.",
        "category_saved" => "Category saved.",
        "category_toggled" => "Category visibility changed.",
        "brand_saved" => "Brand saved.",
        "brand_toggled" => "Brand visibility changed.",
        "product_saved" => "Product saved.",
        "product_toggled" => "Product visibility changed.",
        "image_removed" => "Image removed.",
        "customer_blocked" => "Customer blocked.",
        "customer_unblocked" => "Customer unblocked.",
        "coupon_saved" => "Coupon saved.",
        "coupon_deleted" => "Coupon deleted.",
        "status_updated" => "Item status updated.",
        "item_cancelled" => "Item cancelled.",
        "return_approved" => "Return approved and refund credited to the wallet.",
        "return_rejected" => "Return rejected.",
        "settings_saved" => "Delivery settings saved.",
        _ => return None,
    })
}

// =============================================================================
// Routers
// =============================================================================

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route("/new", get(categories::new))
        .route("/{id}", post(categories::update))
        .route("/{id}/edit", get(categories::edit))
        .route("/{id}/toggle", post(categories::toggle))
}

fn brand_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(brands::index).post(brands::create))
        .route("/{id}", post(brands::update))
        .route("/{id}/edit", get(brands::edit))
        .route("/{id}/toggle", post(brands::toggle))
}

fn product_routes() -> Router<AppState> {
    // Room for a full batch of images plus the text fields
    let upload_limit = MAX_IMAGE_BYTES * MAX_IMAGES_PER_UPLOAD + 64 * 1024;

    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/new", get(products::new))
        .route("/{id}", post(products::update))
        .route("/{id}/edit", get(products::edit))
        .route("/{id}/toggle", post(products::toggle))
        .route("/{id}/images/remove", post(products::remove_image))
        .layer(DefaultBodyLimit::max(upload_limit))
}

fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(customers::index))
        .route("/{id}/block", post(customers::block))
        .route("/{id}/unblock", post(customers::unblock))
}

fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::index).post(coupons::create))
        .route("/new", get(coupons::new))
        .route("/{id}", post(coupons::update))
        .route("/{id}/edit", get(coupons::edit))
        .route("/{id}/delete", post(coupons::delete))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/items/{item_id}/status", post(orders::update_status))
        .route("/{id}/items/{item_id}/cancel", post(orders::cancel_item))
        .route(
            "/{id}/items/{item_id}/return/approve",
            post(orders::approve_return),
        )
        .route(
            "/{id}/items/{item_id}/return/reject",
            post(orders::reject_return),
        )
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reports::index))
        .route("/export.csv", get(reports::export_csv))
        .route("/export.pdf", get(reports::export_pdf))
}

/// Create all admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .route("/settings", get(settings::show).post(settings::update))
        .nest("/auth", auth_routes())
        .nest("/reports", report_routes())
        .nest("/categories", category_routes())
        .nest("/brands", brand_routes())
        .nest("/products", product_routes())
        .nest("/customers", customer_routes())
        .nest("/coupons", coupon_routes())
        .nest("/orders", order_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_resolves_known_codes() {
        let query = MessageQuery {
            error: Some("last_image".to_string()),
            success: Some("coupon_saved".to_string()),
        };
        let flash = query.flash();
        assert_eq!(flash.error, Some("A product must keep at least one image."));
        assert_eq!(flash.success, Some("Coupon saved."));
    }

    #[test]
    fn test_flash_drops_unknown_codes() {
        let query = MessageQuery {
            error: Some("<b>hi</b>".to_string()),
            success: None,
        };
        assert!(query.flash().error.is_none());
    }

    #[test]
    fn test_pagination() {
        assert_eq!(Pagination::offset(None), (1, 0));
        assert_eq!(Pagination::offset(Some(-3)), (1, 0));
        assert_eq!(Pagination::offset(Some(3)), (3, 2 * PER_PAGE));
        let (page, offset) = Pagination::offset(Some(i64::MAX));
        assert!(page > 1 && offset >= 0);

        let p = Pagination::new(1, 0);
        assert_eq!(p.total_pages, 1);
        assert!(!p.has_next());

        let p = Pagination::new(2, PER_PAGE * 2 + 1);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_prev());
        assert!(p.has_next());
    }

    #[test]
    fn test_redirect_flash_appends_query() {
        let response = axum::response::IntoResponse::into_response(redirect_flash(
            "/admin/orders/4",
            FlashKind::Success,
            "status_updated",
        ));
        assert_eq!(
            response.headers()["location"],
            "/admin/orders/4?success=status_updated"
        );

        let response = axum::response::IntoResponse::into_response(redirect_flash(
            "/admin/products?page=2",
            FlashKind::Error,
            "last_image",
        ));
        assert_eq!(
            response.headers()["location"],
            "/admin/products?page=2&error=last_image"
        );
    }
}
