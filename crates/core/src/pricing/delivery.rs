//! Delivery charge computation.
//!
//! The admin maintains one delivery-charge configuration for the whole store.
//! Orders at or above the free-delivery threshold ship free; below it the
//! charge is a base amount plus a per-kilometre rate for the straight-line
//! distance from the store to the delivery address.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::types::round_money;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Build a point from optional coordinates, as stored on addresses.
    #[must_use]
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Self { lat, lng }),
            _ => None,
        }
    }
}

/// Great-circle distance between two points in kilometres.
#[must_use]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Store-wide delivery charge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySettings {
    pub base_charge: Decimal,
    pub per_km_rate: Decimal,
    /// Discounted subtotal at or above which delivery is free. `None` disables.
    pub free_delivery_threshold: Option<Decimal>,
    pub store_location: Option<GeoPoint>,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            base_charge: Decimal::from(40),
            per_km_rate: Decimal::ZERO,
            free_delivery_threshold: Some(Decimal::from(999)),
            store_location: None,
        }
    }
}

impl DeliverySettings {
    /// Delivery charge for a cart.
    ///
    /// `amount` is the subtotal after the coupon discount. Without both store
    /// and destination coordinates only the base charge applies.
    #[must_use]
    pub fn charge_for(&self, amount: Decimal, destination: Option<GeoPoint>) -> Decimal {
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        if self
            .free_delivery_threshold
            .is_some_and(|threshold| amount >= threshold)
        {
            return Decimal::ZERO;
        }

        let distance = self
            .distance_km(destination)
            .and_then(|km| Decimal::from_f64((km * 10.0).round() / 10.0))
            .unwrap_or(Decimal::ZERO);

        round_money(self.base_charge + self.per_km_rate * distance)
    }

    /// Distance from the store to `destination`, if both are known.
    #[must_use]
    pub fn distance_km(&self, destination: Option<GeoPoint>) -> Option<f64> {
        Some(haversine_km(self.store_location?, destination?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    const KOCHI: GeoPoint = GeoPoint {
        lat: 9.9312,
        lng: 76.2673,
    };
    const THRISSUR: GeoPoint = GeoPoint {
        lat: 10.5276,
        lng: 76.2144,
    };

    fn settings() -> DeliverySettings {
        DeliverySettings {
            base_charge: d("40"),
            per_km_rate: d("2"),
            free_delivery_threshold: Some(d("1500")),
            store_location: Some(KOCHI),
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        let km = haversine_km(KOCHI, THRISSUR);
        assert!((km - 66.5).abs() < 1.0, "got {km}");
        assert!(haversine_km(KOCHI, KOCHI).abs() < f64::EPSILON);
    }

    #[test]
    fn test_free_above_threshold() {
        assert_eq!(settings().charge_for(d("1500"), Some(THRISSUR)), Decimal::ZERO);
    }

    #[test]
    fn test_base_plus_distance() {
        let charge = settings().charge_for(d("800"), Some(THRISSUR));
        let km = Decimal::from_f64((haversine_km(KOCHI, THRISSUR) * 10.0).round() / 10.0).unwrap();
        assert_eq!(charge, round_money(d("40") + d("2") * km));
        assert!(charge > d("160"));
    }

    #[test]
    fn test_base_only_without_coordinates() {
        assert_eq!(settings().charge_for(d("800"), None), d("40"));

        let no_store = DeliverySettings {
            store_location: None,
            ..settings()
        };
        assert_eq!(no_store.charge_for(d("800"), Some(THRISSUR)), d("40"));
    }

    #[test]
    fn test_empty_cart_is_free() {
        assert_eq!(settings().charge_for(Decimal::ZERO, None), Decimal::ZERO);
    }
}
