//! Database migration commands.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - connection string for the storefront
//! - `ADMIN_DATABASE_URL` - connection string for the admin panel
//!
//! Both fall back to `DATABASE_URL`. The two binaries normally share one
//! database with separate `storefront` and `admin` schemas, so each
//! migrator ignores versions it does not know about.
//!
//! # Migration Files
//!
//! Storefront migrations: `crates/storefront/migrations/`
//! Admin migrations: `crates/admin/migrations/`
//!
//! Run storefront first: the admin report indexes are created on
//! storefront tables.

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Read a database URL, falling back to `DATABASE_URL`.
fn database_url(key: &'static str) -> Result<SecretString, MigrationError> {
    dotenvy::dotenv().ok();

    std::env::var(key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar(key))
}

async fn run(
    name: &str,
    key: &'static str,
    mut migrator: Migrator,
) -> Result<(), MigrationError> {
    let database_url = database_url(key)?;

    tracing::info!("Connecting to {name} database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running {name} migrations...");
    migrator.set_ignore_missing(true).run(&pool).await?;

    tracing::info!("{name} migrations complete");
    Ok(())
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the URL is missing or a migration fails.
pub async fn storefront() -> Result<(), MigrationError> {
    run(
        "storefront",
        "STOREFRONT_DATABASE_URL",
        sqlx::migrate!("../storefront/migrations"),
    )
    .await
}

/// Run admin database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the URL is missing or a migration fails.
pub async fn admin() -> Result<(), MigrationError> {
    run(
        "admin",
        "ADMIN_DATABASE_URL",
        sqlx::migrate!("../admin/migrations"),
    )
    .await
}
