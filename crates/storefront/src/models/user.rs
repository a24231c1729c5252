//! User domain types.

use chrono::{DateTime, Utc};

use threadly_core::{Email, UserId};

/// A storefront customer.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    /// Linked Google account subject, if any.
    pub google_id: Option<String>,
    /// Whether the account has a password (Google-only accounts do not).
    pub has_password: bool,
    /// Blocked users cannot log in; existing sessions are ended.
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}
