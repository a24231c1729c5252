//! Settings database operations.
//!
//! The store has one settings row, `storefront.delivery_charge`, shared
//! with the storefront's checkout.

use rust_decimal::Decimal;
use sqlx::PgPool;

use threadly_core::pricing::{DeliverySettings, GeoPoint};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    base_charge: Decimal,
    per_km_rate: Decimal,
    free_delivery_threshold: Option<Decimal>,
    store_latitude: Option<f64>,
    store_longitude: Option<f64>,
}

/// Repository for store settings.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the delivery charge settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delivery(&self) -> Result<DeliverySettings, RepositoryError> {
        let row = sqlx::query_as::<_, DeliveryRow>(
            r"
            SELECT base_charge, per_km_rate, free_delivery_threshold,
                   store_latitude, store_longitude
            FROM storefront.delivery_charge
            WHERE id = 1
            ",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map_or_else(DeliverySettings::default, |r| DeliverySettings {
            base_charge: r.base_charge,
            per_km_rate: r.per_km_rate,
            free_delivery_threshold: r.free_delivery_threshold,
            store_location: GeoPoint::from_parts(r.store_latitude, r.store_longitude),
        }))
    }

    /// Save the delivery charge settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn set_delivery(&self, settings: &DeliverySettings) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.delivery_charge
                (id, base_charge, per_km_rate, free_delivery_threshold,
                 store_latitude, store_longitude, updated_at)
            VALUES (1, $1, $2, $3, $4, $5, NOW())
            ON CONFLICT (id) DO UPDATE
            SET base_charge = EXCLUDED.base_charge,
                per_km_rate = EXCLUDED.per_km_rate,
                free_delivery_threshold = EXCLUDED.free_delivery_threshold,
                store_latitude = EXCLUDED.store_latitude,
                store_longitude = EXCLUDED.store_longitude,
                updated_at = NOW()
            ",
        )
        .bind(settings.base_charge)
        .bind(settings.per_km_rate)
        .bind(settings.free_delivery_threshold)
        .bind(settings.store_location.map(|p| p.lat))
        .bind(settings.store_location.map(|p| p.lng))
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
