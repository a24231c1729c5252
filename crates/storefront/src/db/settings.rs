//! Store settings read by the storefront.

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

impl From<DeliveryRow> for DeliverySettings {
    fn from(row: DeliveryRow) -> Self {
        Self {
            base_charge: row.base_charge,
            per_km_rate: row.per_km_rate,
            free_delivery_threshold: row.free_delivery_threshold,
            store_location: GeoPoint::from_parts(row.store_latitude, row.store_longitude),
        }
    }
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

    /// Current delivery settings, or the defaults if the row is missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
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

        Ok(row.map(Into::into).unwrap_or_default())
    }
}
