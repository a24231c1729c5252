//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! - `user`, `email_otp` - Customers and one-time passwords
//! - `category`, `brand`, `product`, `product_size` - Catalog and per-size stock
//! - `cart`, `cart_item` - One cart per user, with the applied coupon
//! - `coupon`, `coupon_usage` - Coupons and per-user usage counts
//! - `address` - Delivery addresses
//! - `wallet`, `wallet_transaction`, `wallet_topup` - Wallet ledger
//! - `customer_order`, `order_item`, `order_item_event`, `return_request` - Orders
//! - `delivery_charge` - Singleton delivery settings
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p threadly-cli -- migrate storefront
//! ```

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod otp;
pub mod settings;
pub mod users;
pub mod wallet;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use cart::CartRepository;
pub use catalog::{CatalogRepository, ProductFilter, ProductSort};
pub use coupons::CouponRepository;
pub use orders::{NewOrder, OrderRepository};
pub use otp::OtpRepository;
pub use settings::SettingsRepository;
pub use users::UserRepository;
pub use wallet::WalletRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_unique(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
