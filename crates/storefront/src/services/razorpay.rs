//! Razorpay payment gateway client.
//!
//! Creates gateway orders over the REST API (HTTP basic auth with the key
//! id and secret) and verifies the signatures Razorpay attaches to checkout
//! callbacks and webhooks.

use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, error, instrument};

use threadly_core::to_paise;

use crate::config::RazorpayConfig;

/// Razorpay REST API base URL.
const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

/// Errors from the Razorpay integration.
#[derive(Debug, Error)]
pub enum RazorpayError {
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Razorpay returned an error response.
    #[error("razorpay API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Amount cannot be expressed in paise.
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Signature did not match.
    #[error("signature mismatch")]
    InvalidSignature,

    /// Webhook secret is not configured.
    #[error("webhook secret not configured")]
    WebhookNotConfigured,
}

/// A gateway order as returned by Razorpay.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    description: String,
}

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    #[must_use]
    pub fn new(config: &RazorpayConfig) -> Self {
        Self {
            client: Client::new(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Public key id, embedded in the checkout page.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a gateway order for `amount` rupees.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::InvalidAmount` for a non-positive amount and
    /// `RazorpayError::Api` if Razorpay rejects the request.
    #[instrument(skip(self), fields(receipt = %receipt))]
    pub async fn create_order(
        &self,
        amount: Decimal,
        receipt: &str,
    ) -> Result<GatewayOrder, RazorpayError> {
        let paise = to_paise(amount)
            .filter(|p| *p > 0)
            .ok_or(RazorpayError::InvalidAmount(amount))?;

        let response = self
            .client
            .post(format!("{RAZORPAY_API_BASE}/orders"))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateOrderRequest {
                amount: paise,
                currency: "INR",
                receipt,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map_or_else(|_| status.to_string(), |b| b.error.description);
            error!(status = status.as_u16(), %message, "Razorpay order creation failed");
            return Err(RazorpayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder = response.json().await?;
        debug!(order_id = %order.id, "Razorpay order created");
        Ok(order)
    }

    /// Verify the signature from the checkout callback.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::InvalidSignature` if it does not match.
    pub fn verify_payment_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), RazorpayError> {
        let expected = sign(
            self.key_secret.expose_secret(),
            format!("{order_id}|{payment_id}").as_bytes(),
        );
        if constant_time_compare(&expected, signature) {
            Ok(())
        } else {
            Err(RazorpayError::InvalidSignature)
        }
    }

    /// Verify the `X-Razorpay-Signature` header of a webhook body.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::WebhookNotConfigured` without a webhook secret
    /// and `RazorpayError::InvalidSignature` if it does not match.
    pub fn verify_webhook_signature(
        &self,
        body: &[u8],
        signature: &str,
    ) -> Result<(), RazorpayError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or(RazorpayError::WebhookNotConfigured)?;
        let expected = sign(secret.expose_secret(), body);
        if constant_time_compare(&expected, signature) {
            Ok(())
        } else {
            Err(RazorpayError::InvalidSignature)
        }
    }
}

/// Hex `HMAC_SHA256(secret, payload)`.
#[must_use]
pub fn sign(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

// =============================================================================
// Webhook payloads
// =============================================================================

/// The parts of a webhook event the storefront reads.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<PaymentWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentWrapper {
    pub entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    pub amount: i64,
    pub status: String,
}

impl WebhookEvent {
    /// The payment entity, if the event carries one.
    #[must_use]
    pub fn payment(&self) -> Option<&PaymentEntity> {
        self.payload.payment.as_ref().map(|p| &p.entity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(webhook: Option<&str>) -> RazorpayClient {
        RazorpayClient::new(&RazorpayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: SecretString::from("test_key_secret"),
            webhook_secret: webhook.map(SecretString::from),
        })
    }

    #[test]
    fn test_payment_signature_round_trip() {
        let rzp = client(None);
        let sig = sign("test_key_secret", b"order_ABC|pay_XYZ");
        assert!(rzp.verify_payment_signature("order_ABC", "pay_XYZ", &sig).is_ok());
        assert!(matches!(
            rzp.verify_payment_signature("order_ABC", "pay_OTHER", &sig),
            Err(RazorpayError::InvalidSignature)
        ));
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign("Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = sign("hook_secret", body);

        assert!(client(Some("hook_secret"))
            .verify_webhook_signature(body, &sig)
            .is_ok());
        assert!(matches!(
            client(Some("hook_secret")).verify_webhook_signature(b"tampered", &sig),
            Err(RazorpayError::InvalidSignature)
        ));
        assert!(matches!(
            client(None).verify_webhook_signature(body, &sig),
            Err(RazorpayError::WebhookNotConfigured)
        ));
    }

    #[test]
    fn test_webhook_event_parsing() {
        let json = r#"{
            "event": "payment.captured",
            "payload": {"payment": {"entity": {
                "id": "pay_1", "order_id": "order_1", "amount": 49900, "status": "captured"
            }}}
        }"#;
        let event: WebhookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event, "payment.captured");
        let payment = event.payment().unwrap();
        assert_eq!(payment.order_id.as_deref(), Some("order_1"));
        assert_eq!(payment.amount, 49_900);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let out = format!("{:?}", client(None));
        assert!(!out.contains("test_key_secret"));
        assert!(out.contains("rzp_test_key"));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
