//! Shopper sessions.
//!
//! Rows live in `tower_sessions.session`, created by the storefront
//! migrations. The cookie carries the login, the pending signup and the
//! OAuth state between redirects, so it must survive the top-level GET back
//! from Google and uses SameSite=Lax.

use sqlx::PgPool;
use tower_sessions::cookie::{SameSite, time::Duration};
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "th_session";

/// Idle time after which a shopper is logged out.
pub const SESSION_IDLE_DAYS: i64 = 7;

/// Session layer over the shared pool.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    SessionManagerLayer::new(PostgresStore::new(pool.clone()))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_IDLE_DAYS)))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
