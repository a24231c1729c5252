//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! threadly-cli admin create -e admin@example.com -n "Admin Name" -r super_admin -p 'long password here'
//! ```
//!
//! The password may also come from `ADMIN_PASSWORD` to keep it out of shell
//! history.
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use threadly_admin::db;
use threadly_admin::models::AdminRole;
use threadly_admin::services::{AdminAuthError, AdminAuthService};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin, viewer")]
    InvalidRole(String),

    /// Empty display name.
    #[error("Name must not be empty")]
    EmptyName,

    /// Email, password or uniqueness problem.
    #[error(transparent)]
    Auth(#[from] AdminAuthError),
}

/// Create a new admin user with a password.
///
/// # Errors
///
/// Returns `AdminError` for a bad role or name, a missing database URL, a
/// weak password, an invalid email or an email already in use.
pub async fn create_user(
    email: &str,
    name: &str,
    role: &str,
    password: &SecretString,
) -> Result<i32, AdminError> {
    dotenvy::dotenv().ok();

    let role: AdminRole = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;

    if name.trim().is_empty() {
        return Err(AdminError::EmptyName);
    }

    let database_url = std::env::var("ADMIN_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| AdminError::MissingEnvVar("ADMIN_DATABASE_URL"))?;

    tracing::info!("Connecting to admin database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Creating admin user: {} ({})", email, role);

    let user = AdminAuthService::new(&pool)
        .create_admin(email, name, role, password.expose_secret())
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );

    Ok(user.id.as_i32())
}
