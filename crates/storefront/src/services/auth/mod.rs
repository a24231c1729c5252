//! Authentication service.
//!
//! Provides password login, OTP-confirmed registration, password changes and
//! Google sign-in account linking.

mod error;

pub use error::{AuthError, PasswordIssue};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use threadly_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::{PendingSignup, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum display name length.
const MAX_NAME_LENGTH: usize = 100;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Validate a registration and hash its password.
    ///
    /// Nothing is stored; the result is kept in the session until the email
    /// OTP is verified.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidField`, `AuthError::InvalidEmail` or
    /// `AuthError::WeakPassword` for invalid input.
    /// Returns `AuthError::UserAlreadyExists` if the email is registered.
    pub async fn prepare_signup(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
        password: &str,
        password_confirm: &str,
    ) -> Result<PendingSignup, AuthError> {
        let name = validate_name(name)?;
        let email = Email::parse(email)?;
        let phone = phone
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(validate_phone)
            .transpose()?;
        validate_password(password, password_confirm)?;

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        Ok(PendingSignup {
            name,
            email,
            phone,
            password_hash: hash_password(password)?,
        })
    }

    /// Create the account for a verified signup.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email was taken meanwhile.
    pub async fn complete_signup(&self, pending: &PendingSignup) -> Result<User, AuthError> {
        self.users
            .create(&NewUser {
                email: &pending.email,
                name: &pending.name,
                phone: pending.phone.as_deref(),
                password_hash: Some(&pending.password_hash),
                google_id: None,
            })
            .await
            .map_err(map_conflict)
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email or password is wrong.
    /// Returns `AuthError::Blocked` if the account is blocked.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &hash)?;

        if user.is_blocked {
            return Err(AuthError::Blocked);
        }

        Ok(user)
    }

    /// Set a new password after a verified reset OTP.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password is invalid.
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn reset_password(
        &self,
        email: &Email,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), AuthError> {
        validate_password(password, password_confirm)?;
        let hash = hash_password(password)?;

        self.users
            .update_password(email, &hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => other.into(),
            })
    }

    /// Change a logged-in user's password.
    ///
    /// Accounts created through Google have no password and may set one
    /// without `current`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    /// Returns `AuthError::WeakPassword` if the new password is invalid.
    pub async fn change_password(
        &self,
        user_id: UserId,
        email: &Email,
        current: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), AuthError> {
        if let Some(hash) = self.users.password_hash_for(user_id).await? {
            verify_password(current, &hash)?;
        }
        validate_password(password, password_confirm)?;
        if password == current {
            return Err(AuthError::WeakPassword(PasswordIssue::Unchanged));
        }

        let hash = hash_password(password)?;
        self.users.update_password(email, &hash).await?;
        Ok(())
    }

    /// Whether an email belongs to an account, for password resets.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn find_by_email(&self, email: &Email) -> Result<Option<User>, AuthError> {
        Ok(self.users.get_by_email(email).await?)
    }

    // =========================================================================
    // Google Sign-In
    // =========================================================================

    /// Find or create the user for a Google account.
    ///
    /// An existing account with the same email is linked to the Google
    /// account instead of creating a duplicate.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Blocked` if the account is blocked.
    pub async fn login_with_google(
        &self,
        google_id: &str,
        email: &Email,
        name: &str,
    ) -> Result<User, AuthError> {
        let user = if let Some(user) = self.users.get_by_google_id(google_id).await? {
            user
        } else if let Some(user) = self.users.get_by_email(email).await? {
            self.users
                .link_google(user.id, google_id)
                .await
                .map_err(map_conflict)?;
            user
        } else {
            let name = validate_name(name).unwrap_or_else(|_| email.local_part().to_string());
            self.users
                .create(&NewUser {
                    email,
                    name: &name,
                    phone: None,
                    password_hash: None,
                    google_id: Some(google_id),
                })
                .await
                .map_err(map_conflict)?
        };

        if user.is_blocked {
            return Err(AuthError::Blocked);
        }

        Ok(user)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidField` for invalid input.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        name: &str,
        phone: Option<&str>,
    ) -> Result<(), AuthError> {
        let name = validate_name(name)?;
        let phone = phone
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(validate_phone)
            .transpose()?;

        self.users
            .update_profile(user_id, &name, phone.as_deref())
            .await?;
        Ok(())
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

fn map_conflict(e: RepositoryError) -> AuthError {
    match e {
        RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
        other => other.into(),
    }
}

/// Validate a display name.
pub fn validate_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidField {
            field: "name",
            message: "is required",
        });
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidField {
            field: "name",
            message: "is too long",
        });
    }
    Ok(name.to_string())
}

/// Validate a 10-digit Indian mobile number.
pub fn validate_phone(phone: &str) -> Result<String, AuthError> {
    let phone = phone.trim();
    if phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit()) {
        Ok(phone.to_string())
    } else {
        Err(AuthError::InvalidField {
            field: "phone",
            message: "must be 10 digits",
        })
    }
}

/// Validate password meets requirements.
pub fn validate_password(password: &str, password_confirm: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(PasswordIssue::TooShort));
    }
    if password != password_confirm {
        return Err(AuthError::WeakPassword(PasswordIssue::Mismatch));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules() {
        assert!(matches!(
            validate_password("short", "short"),
            Err(AuthError::WeakPassword(PasswordIssue::TooShort))
        ));
        assert!(matches!(
            validate_password("longenough", "different1"),
            Err(AuthError::WeakPassword(PasswordIssue::Mismatch))
        ));
        assert!(validate_password("longenough", "longenough").is_ok());
    }

    #[test]
    fn test_phone_rules() {
        assert_eq!(validate_phone(" 9876543210 ").unwrap(), "9876543210");
        assert!(validate_phone("98765").is_err());
        assert!(validate_phone("98765abcde").is_err());
    }

    #[test]
    fn test_name_rules() {
        assert_eq!(validate_name("  Asha  ").unwrap(), "Asha");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
