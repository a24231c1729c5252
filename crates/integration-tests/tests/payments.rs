//! Razorpay checkout callback and webhook signatures.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;

use threadly_storefront::config::RazorpayConfig;
use threadly_storefront::services::RazorpayClient;
use threadly_storefront::services::razorpay::sign;

fn client(webhook_secret: Option<&str>) -> RazorpayClient {
    RazorpayClient::new(&RazorpayConfig {
        key_id: "rzp_test_threadly".to_string(),
        key_secret: SecretString::from("checkout-secret"),
        webhook_secret: webhook_secret.map(SecretString::from),
    })
}

#[test]
fn test_checkout_signature_round_trip() {
    let signature = sign("checkout-secret", b"order_N5abc|pay_N5xyz");
    let client = client(None);

    assert!(
        client
            .verify_payment_signature("order_N5abc", "pay_N5xyz", &signature)
            .is_ok()
    );
    assert!(
        client
            .verify_payment_signature("order_N5abc", "pay_other", &signature)
            .is_err()
    );
}

#[test]
fn test_signature_from_another_secret_is_refused() {
    let forged = sign("not-the-secret", b"order_N5abc|pay_N5xyz");
    assert!(
        client(None)
            .verify_payment_signature("order_N5abc", "pay_N5xyz", &forged)
            .is_err()
    );
}

#[test]
fn test_webhook_signature_needs_webhook_secret() {
    let body = br#"{"event":"payment.captured"}"#;
    let signature = sign("hook-secret", body);

    assert!(client(None).verify_webhook_signature(body, &signature).is_err());
    assert!(
        client(Some("hook-secret"))
            .verify_webhook_signature(body, &signature)
            .is_ok()
    );
}

#[test]
fn test_signature_is_lowercase_hex_sha256() {
    let signature = sign("k", b"payload");
    assert_eq!(signature.len(), 64);
    assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}
