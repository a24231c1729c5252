//! Admin panel over HTTP.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`threadly-cli migrate all`)
//! - The admin server running (`cargo run -p threadly-admin`)
//!
//! Run with: `cargo test -p threadly-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode, redirect::Policy};

use threadly_integration_tests::admin_base_url;

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_panel_redirects_to_login_without_session() {
    let base_url = admin_base_url();

    for path in ["/admin", "/admin/orders", "/admin/reports/export.csv"] {
        let resp = client().get(format!("{base_url}{path}")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(resp.headers()["location"], "/admin/auth/login");
    }
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_login_page_headers() {
    let resp = client()
        .get(format!("{}/admin/auth/login", admin_base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(
        headers["content-security-policy"]
            .to_str()
            .unwrap()
            .contains("frame-ancestors 'none'")
    );
    assert_eq!(headers["x-request-id"].to_str().unwrap().len(), 36);
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_wrong_password_is_refused() {
    let resp = client()
        .post(format!("{}/admin/auth/login", admin_base_url()))
        .form(&[
            ("email", "nobody@threadly.test"),
            ("password", "definitely-not-right"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get("set-cookie").is_none_or(|c| {
        !c.to_str().unwrap_or_default().contains("th_admin_session")
    }));
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_health_endpoints() {
    let base_url = admin_base_url();
    let resp = client().get(format!("{base_url}/health")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = client()
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
