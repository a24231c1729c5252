//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use threadly_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
}

/// A registration waiting for its email OTP to be confirmed.
///
/// The password is already hashed; nothing is written to the user table
/// until the code is verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSignup {
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub password_hash: String,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for a registration awaiting OTP verification.
    pub const PENDING_SIGNUP: &str = "pending_signup";

    /// Email whose password is being reset.
    pub const RESET_EMAIL: &str = "reset_email";

    /// Set once the password reset OTP has been verified.
    pub const RESET_VERIFIED: &str = "reset_verified";

    /// Key for Google OAuth state (CSRF protection).
    pub const GOOGLE_OAUTH_STATE: &str = "google_oauth_state";

    /// Key for Google OAuth nonce (`OpenID` Connect replay protection).
    pub const GOOGLE_OAUTH_NONCE: &str = "google_oauth_nonce";
}
