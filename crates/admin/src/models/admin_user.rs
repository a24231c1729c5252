//! Admin user domain types.

use chrono::{DateTime, Utc};

use threadly_core::{AdminUserId, Email};

// Re-export AdminRole from core for convenience
pub use threadly_core::AdminRole;

/// An admin user (domain type).
///
/// The password hash never leaves `crate::db::admin_users`.
#[derive(Debug, Clone)]
pub struct AdminUser {
    /// Unique admin user ID.
    pub id: AdminUserId,
    /// Admin's email address.
    pub email: Email,
    /// Admin's display name.
    pub name: String,
    /// Admin's role/permission level.
    pub role: AdminRole,
    /// Last successful sign-in.
    pub last_login_at: Option<DateTime<Utc>>,
    /// When the admin was created.
    pub created_at: DateTime<Utc>,
}
