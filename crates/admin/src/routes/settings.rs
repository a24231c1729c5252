//! Delivery charge settings.

use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    response::{Html, Redirect},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use threadly_core::pricing::{DeliverySettings, GeoPoint};
use threadly_core::round_money;

use super::{AdminUserView, Flash, FlashKind, MessageQuery, redirect_flash, render};
use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireSuperAdmin};
use crate::state::AppState;

/// Delivery settings form data. Blank threshold disables free delivery.
#[derive(Debug, Deserialize)]
pub struct DeliveryForm {
    pub base_charge: String,
    pub per_km_rate: String,
    #[serde(default)]
    pub free_delivery_threshold: String,
    #[serde(default)]
    pub store_latitude: String,
    #[serde(default)]
    pub store_longitude: String,
}

fn parse_amount(value: &str) -> Result<Decimal, &'static str> {
    value
        .trim()
        .parse::<Decimal>()
        .ok()
        .map(round_money)
        .filter(|v| *v >= Decimal::ZERO)
        .ok_or("invalid_delivery")
}

fn parse_coordinate(value: &str, limit: f64) -> Result<Option<f64>, &'static str> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= limit)
        .map(Some)
        .ok_or("invalid_location")
}

impl DeliveryForm {
    /// Validate into settings.
    ///
    /// # Errors
    ///
    /// Returns the flash code of the first invalid field.
    pub fn validate(&self) -> Result<DeliverySettings, &'static str> {
        let base_charge = parse_amount(&self.base_charge)?;
        let per_km_rate = parse_amount(&self.per_km_rate)?;
        let free_delivery_threshold = if self.free_delivery_threshold.trim().is_empty() {
            None
        } else {
            Some(parse_amount(&self.free_delivery_threshold)?)
        };

        let lat = parse_coordinate(&self.store_latitude, 90.0)?;
        let lng = parse_coordinate(&self.store_longitude, 180.0)?;
        if lat.is_some() != lng.is_some() {
            return Err("invalid_location");
        }

        Ok(DeliverySettings {
            base_charge,
            per_km_rate,
            free_delivery_threshold,
            store_location: GeoPoint::from_parts(lat, lng),
        })
    }
}

/// Settings page template.
#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub delivery: DeliverySettings,
    pub flash: Flash,
}

/// Settings page.
#[instrument(skip(state, admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let delivery = SettingsRepository::new(state.pool()).delivery().await?;

    Ok(render(&SettingsTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/settings".to_string(),
        delivery,
        flash: query.flash(),
    }))
}

/// Save delivery settings. Super admins only.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Form(form): Form<DeliveryForm>,
) -> Result<Redirect, AppError> {
    let back = "/admin/settings";
    let settings = match form.validate() {
        Ok(settings) => settings,
        Err(code) => return Ok(redirect_flash(back, FlashKind::Error, code)),
    };

    SettingsRepository::new(state.pool())
        .set_delivery(&settings)
        .await?;
    tracing::info!(
        base_charge = %settings.base_charge,
        per_km_rate = %settings.per_km_rate,
        "Delivery settings updated"
    );

    Ok(redirect_flash(back, FlashKind::Success, "settings_saved"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(threshold: &str, lat: &str, lng: &str) -> DeliveryForm {
        DeliveryForm {
            base_charge: "40".to_string(),
            per_km_rate: "2.5".to_string(),
            free_delivery_threshold: threshold.to_string(),
            store_latitude: lat.to_string(),
            store_longitude: lng.to_string(),
        }
    }

    #[test]
    fn test_valid_settings() {
        let settings = form("999", "9.9312", "76.2673").validate().unwrap();
        assert_eq!(settings.base_charge, Decimal::from(40));
        assert_eq!(settings.free_delivery_threshold, Some(Decimal::from(999)));
        assert!(settings.store_location.is_some());

        let settings = form("", "", "").validate().unwrap();
        assert_eq!(settings.free_delivery_threshold, None);
        assert_eq!(settings.store_location, None);
    }

    #[test]
    fn test_invalid_settings() {
        let mut f = form("", "", "");
        f.base_charge = "-1".to_string();
        assert_eq!(f.validate().unwrap_err(), "invalid_delivery");

        assert_eq!(
            form("", "9.93", "").validate().unwrap_err(),
            "invalid_location"
        );
        assert_eq!(
            form("", "95", "76").validate().unwrap_err(),
            "invalid_location"
        );
    }
}
