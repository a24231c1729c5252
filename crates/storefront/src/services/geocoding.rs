//! Address geocoding via the Google Geocoding API.
//!
//! Coordinates are optional everywhere; a failed or empty lookup just means
//! the delivery charge falls back to the base rate.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{instrument, warn};

use threadly_core::pricing::GeoPoint;

const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Error)]
pub enum GeocodingError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geocoding API returned {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Geocoding client.
#[derive(Clone)]
pub struct GeocodingClient {
    client: Client,
    api_key: SecretString,
}

impl GeocodingClient {
    #[must_use]
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    /// Look up coordinates for a free-form address.
    ///
    /// Returns `None` when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns `GeocodingError` if the request fails or the API reports an error.
    #[instrument(skip(self))]
    pub async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, GeocodingError> {
        let response: GeocodeResponse = self
            .client
            .get(GEOCODE_URL)
            .query(&[
                ("address", address),
                ("region", "in"),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_response(response)
    }
}

fn parse_response(response: GeocodeResponse) -> Result<Option<GeoPoint>, GeocodingError> {
    match response.status.as_str() {
        "OK" => Ok(response
            .results
            .first()
            .map(|r| GeoPoint {
                lat: r.geometry.location.lat,
                lng: r.geometry.location.lng,
            })),
        "ZERO_RESULTS" => Ok(None),
        other => {
            warn!(status = other, "Geocoding request rejected");
            Err(GeocodingError::Api(other.to_string()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Option<GeoPoint>, GeocodingError> {
        parse_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_first_result_wins() {
        let point = parse(
            r#"{"status":"OK","results":[
                {"geometry":{"location":{"lat":12.97,"lng":77.59}}},
                {"geometry":{"location":{"lat":1.0,"lng":1.0}}}
            ]}"#,
        )
        .unwrap()
        .unwrap();
        assert!((point.lat - 12.97).abs() < f64::EPSILON);
        assert!((point.lng - 77.59).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_results_is_none() {
        assert!(parse(r#"{"status":"ZERO_RESULTS","results":[]}"#).unwrap().is_none());
    }

    #[test]
    fn test_denied_is_error() {
        assert!(matches!(
            parse(r#"{"status":"REQUEST_DENIED"}"#),
            Err(GeocodingError::Api(s)) if s == "REQUEST_DENIED"
        ));
    }
}
