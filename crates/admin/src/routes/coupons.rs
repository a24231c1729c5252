//! Coupon management.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use threadly_core::pricing::{MAX_OFFER_PERCENT, normalize_code};
use threadly_core::{CouponId, DiscountType, round_money};

use super::{AdminUserView, Flash, FlashKind, MessageQuery, redirect_flash, render};
use crate::db::coupons::CouponInput;
use crate::db::{CouponRepository, RepositoryError};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireAdminWrite};
use crate::models::{Coupon, store_date, store_day_end};
use crate::state::AppState;

const MIN_CODE_LENGTH: usize = 3;
const MAX_CODE_LENGTH: usize = 20;

/// Coupon form data. `expires_on` is a store date (`YYYY-MM-DD`); the
/// coupon stays valid to the end of that day.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount_type: String,
    pub discount_value: String,
    #[serde(default)]
    pub min_purchase: String,
    #[serde(default)]
    pub max_discount: String,
    pub usage_limit: String,
    pub expires_on: String,
    pub is_active: Option<String>,
}

fn parse_money(value: &str) -> Option<Decimal> {
    value.trim().parse::<Decimal>().ok().map(round_money)
}

/// Upper-cased code of 3 to 20 letters, digits, dashes or underscores.
///
/// # Errors
///
/// Returns the `invalid_code` flash code.
pub fn validate_code(code: &str) -> Result<String, &'static str> {
    let code = normalize_code(code);
    let valid_chars = code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_chars || !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len()) {
        return Err("invalid_code");
    }
    Ok(code)
}

impl CouponForm {
    /// Validate into repository input.
    ///
    /// Percentage coupons take 1 to 90 percent. Flat coupons must be worth
    /// less than their minimum purchase. A new coupon must expire in the
    /// future; an edited one may keep a past expiry.
    ///
    /// # Errors
    ///
    /// Returns the flash code of the first invalid field.
    pub fn validate(&self, now: DateTime<Utc>, creating: bool) -> Result<CouponInput, &'static str> {
        let code = validate_code(&self.code)?;
        let discount_type = self
            .discount_type
            .parse::<DiscountType>()
            .map_err(|_| "invalid_value")?;
        let value = parse_money(&self.discount_value).ok_or("invalid_value")?;

        let min_purchase = if self.min_purchase.trim().is_empty() {
            Decimal::ZERO
        } else {
            parse_money(&self.min_purchase)
                .filter(|m| *m >= Decimal::ZERO)
                .ok_or("invalid_minimum")?
        };

        let max_discount = match discount_type {
            DiscountType::Percentage => {
                if value < Decimal::ONE || value > Decimal::from(MAX_OFFER_PERCENT) {
                    return Err("invalid_percentage");
                }
                if self.max_discount.trim().is_empty() {
                    None
                } else {
                    Some(
                        parse_money(&self.max_discount)
                            .filter(|m| *m > Decimal::ZERO)
                            .ok_or("invalid_max_discount")?,
                    )
                }
            }
            DiscountType::Flat => {
                if value <= Decimal::ZERO {
                    return Err("invalid_value");
                }
                if value >= min_purchase {
                    return Err("flat_exceeds_minimum");
                }
                None
            }
        };

        let usage_limit = self
            .usage_limit
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|u| *u >= 1)
            .ok_or("invalid_usage")?;

        let expires_at = NaiveDate::parse_from_str(self.expires_on.trim(), "%Y-%m-%d")
            .ok()
            .and_then(store_day_end)
            .ok_or("invalid_expiry")?;
        if creating && expires_at <= now {
            return Err("expiry_past");
        }

        Ok(CouponInput {
            code,
            description: self.description.trim().to_string(),
            discount_type,
            discount_value: value,
            min_purchase,
            max_discount,
            usage_limit,
            expires_at,
            is_active: self.is_active.is_some(),
        })
    }
}

/// Coupon list template.
#[derive(Template)]
#[template(path = "coupons/index.html")]
pub struct CouponsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub coupons: Vec<CouponRow>,
    pub flash: Flash,
}

/// A coupon in the list, with its expiry worked out at render time.
pub struct CouponRow {
    pub coupon: Coupon,
    pub expired: bool,
}

/// Coupon form template, for both create and edit.
#[derive(Template)]
#[template(path = "coupons/form.html")]
pub struct CouponFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub coupon: Option<Coupon>,
    pub action: String,
    pub today: NaiveDate,
    pub flash: Flash,
}

impl CouponFormTemplate {
    /// Value for the expiry date input.
    #[must_use]
    pub fn expires_on(&self) -> String {
        self.coupon
            .as_ref()
            .map(|c| store_date(c.expires_at).to_string())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.coupon
            .as_ref()
            .is_some_and(|c| c.discount_type == DiscountType::Flat)
    }
}

/// Coupon list.
#[instrument(skip(state, admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let now = Utc::now();
    let coupons = CouponRepository::new(state.pool())
        .list()
        .await?
        .into_iter()
        .map(|coupon| CouponRow {
            expired: coupon.is_expired(now),
            coupon,
        })
        .collect();

    Ok(render(&CouponsTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/coupons".to_string(),
        coupons,
        flash: query.flash(),
    }))
}

/// New coupon form.
#[instrument(skip(admin))]
pub async fn new(
    RequireAdminWrite(admin): RequireAdminWrite,
    Query(query): Query<MessageQuery>,
) -> Html<String> {
    render(&CouponFormTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/coupons".to_string(),
        coupon: None,
        action: "/admin/coupons".to_string(),
        today: store_date(Utc::now()),
        flash: query.flash(),
    })
}

/// Edit coupon form.
#[instrument(skip(state, admin))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let coupon = CouponRepository::new(state.pool())
        .get(CouponId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

    Ok(render(&CouponFormTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/coupons".to_string(),
        coupon: Some(coupon),
        action: format!("/admin/coupons/{id}"),
        today: store_date(Utc::now()),
        flash: query.flash(),
    }))
}

/// Create a coupon.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Form(form): Form<CouponForm>,
) -> Result<Redirect, AppError> {
    let back = "/admin/coupons/new";
    let input = match form.validate(Utc::now(), true) {
        Ok(input) => input,
        Err(code) => return Ok(redirect_flash(back, FlashKind::Error, code)),
    };

    match CouponRepository::new(state.pool()).create(&input).await {
        Ok(id) => {
            tracing::info!(coupon_id = %id, code = %input.code, "Coupon created");
            Ok(redirect_flash(
                "/admin/coupons",
                FlashKind::Success,
                "coupon_saved",
            ))
        }
        Err(RepositoryError::Conflict(_)) => {
            Ok(redirect_flash(back, FlashKind::Error, "code_taken"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Update a coupon.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
    Form(form): Form<CouponForm>,
) -> Result<Redirect, AppError> {
    let back = format!("/admin/coupons/{id}/edit");
    let input = match form.validate(Utc::now(), false) {
        Ok(input) => input,
        Err(code) => return Ok(redirect_flash(&back, FlashKind::Error, code)),
    };

    match CouponRepository::new(state.pool())
        .update(CouponId::new(id), &input)
        .await
    {
        Ok(()) => {
            tracing::info!(coupon_id = id, code = %input.code, "Coupon updated");
            Ok(redirect_flash(
                "/admin/coupons",
                FlashKind::Success,
                "coupon_saved",
            ))
        }
        Err(RepositoryError::Conflict(_)) => {
            Ok(redirect_flash(&back, FlashKind::Error, "code_taken"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a coupon. Orders keep the code as text.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    CouponRepository::new(state.pool())
        .delete(CouponId::new(id))
        .await?;
    tracing::info!(coupon_id = id, "Coupon deleted");

    Ok(redirect_flash(
        "/admin/coupons",
        FlashKind::Success,
        "coupon_deleted",
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-10-15T06:00:00Z".parse().unwrap()
    }

    fn form() -> CouponForm {
        CouponForm {
            code: " diwali25 ".to_string(),
            description: "Festive offer".to_string(),
            discount_type: "percentage".to_string(),
            discount_value: "25".to_string(),
            min_purchase: "999".to_string(),
            max_discount: "500".to_string(),
            usage_limit: "2".to_string(),
            expires_on: "2026-11-15".to_string(),
            is_active: Some("on".to_string()),
        }
    }

    #[test]
    fn test_valid_percentage_coupon() {
        let input = form().validate(now(), true).unwrap();
        assert_eq!(input.code, "DIWALI25");
        assert_eq!(input.discount_type, DiscountType::Percentage);
        assert_eq!(input.max_discount, Some(Decimal::from(500)));
        assert_eq!(input.usage_limit, 2);
        assert!(input.is_active);
        assert_eq!(store_date(input.expires_at).to_string(), "2026-11-15");
    }

    #[test]
    fn test_percentage_bounds() {
        let mut f = form();
        f.discount_value = "0".to_string();
        assert_eq!(f.validate(now(), true).unwrap_err(), "invalid_percentage");
        f.discount_value = "91".to_string();
        assert_eq!(f.validate(now(), true).unwrap_err(), "invalid_percentage");
        f.discount_value = "90".to_string();
        assert!(f.validate(now(), true).is_ok());
    }

    #[test]
    fn test_flat_must_be_below_minimum() {
        let mut f = form();
        f.discount_type = "flat".to_string();
        f.discount_value = "999".to_string();
        assert_eq!(f.validate(now(), true).unwrap_err(), "flat_exceeds_minimum");

        f.discount_value = "150".to_string();
        let input = f.validate(now(), true).unwrap();
        assert_eq!(input.max_discount, None);
    }

    #[test]
    fn test_usage_and_expiry() {
        let mut f = form();
        f.usage_limit = "0".to_string();
        assert_eq!(f.validate(now(), true).unwrap_err(), "invalid_usage");

        let mut f = form();
        f.expires_on = "2026-10-01".to_string();
        assert_eq!(f.validate(now(), true).unwrap_err(), "expiry_past");
        assert!(f.validate(now(), false).is_ok());

        f.expires_on = "15/11/2026".to_string();
        assert_eq!(f.validate(now(), false).unwrap_err(), "invalid_expiry");
    }

    #[test]
    fn test_code_rules() {
        assert_eq!(validate_code("new-user_10").unwrap(), "NEW-USER_10");
        assert!(validate_code("ab").is_err());
        assert!(validate_code("SPACE OFF").is_err());
        assert!(validate_code(&"A".repeat(21)).is_err());
    }
}
