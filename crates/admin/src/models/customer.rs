//! Customer type for the admin panel.

use chrono::{DateTime, Utc};

use threadly_core::UserId;

/// A storefront customer.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_blocked: bool,
    pub signed_in_with_google: bool,
    pub order_count: i64,
    pub created_at: DateTime<Utc>,
}
