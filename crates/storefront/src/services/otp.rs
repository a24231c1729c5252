//! Email one-time passwords for registration and password reset.
//!
//! Codes are six digits, stored as SHA-256 hashes, valid for
//! [`OTP_TTL_MINUTES`] and allow at most [`MAX_ATTEMPTS`] wrong guesses.
//! A new code can be requested once [`RESEND_COOLDOWN_SECS`] have passed.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;

use threadly_core::Email;

use super::email::{EmailError, EmailService};
use super::razorpay::constant_time_compare;
use crate::db::otp::OtpRecord;
use crate::db::{OtpRepository, RepositoryError};

/// Minutes a code stays valid.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Wrong guesses allowed per code.
pub const MAX_ATTEMPTS: i32 = 5;

/// Seconds before another code may be sent.
pub const RESEND_COOLDOWN_SECS: i64 = 60;

/// What a code is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Signup,
    PasswordReset,
}

impl OtpPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::PasswordReset => "password_reset",
        }
    }

    /// Mail subject line.
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::Signup => "Verify your Threadly account",
            Self::PasswordReset => "Reset your Threadly password",
        }
    }
}

/// OTP failures.
#[derive(Debug, Error)]
pub enum OtpError {
    #[error("please wait {seconds} seconds before requesting a new code")]
    Cooldown { seconds: i64 },
    #[error("this code has expired, request a new one")]
    Expired,
    #[error("too many wrong attempts, request a new code")]
    TooManyAttempts,
    #[error("incorrect code, {remaining} attempts left")]
    Invalid { remaining: i32 },
    #[error("no code was requested for this email")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Email(#[from] EmailError),
}

/// Issues and checks email codes.
pub struct OtpService<'a> {
    otps: OtpRepository<'a>,
    email: &'a EmailService,
}

impl<'a> OtpService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService) -> Self {
        Self {
            otps: OtpRepository::new(pool),
            email,
        }
    }

    /// Generate, store and mail a fresh code, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::Cooldown` if a code was sent too recently.
    /// Returns `OtpError::Email` if the mail could not be sent.
    pub async fn issue(&self, email: &Email, purpose: OtpPurpose) -> Result<(), OtpError> {
        let now = Utc::now();

        if let Some(existing) = self.otps.get(email, purpose.as_str()).await? {
            let wait = cooldown_remaining(existing.created_at, now);
            if wait > 0 {
                return Err(OtpError::Cooldown { seconds: wait });
            }
        }

        let code = generate_code();
        self.otps
            .upsert(
                email,
                purpose.as_str(),
                &hash_code(&code),
                now + Duration::minutes(OTP_TTL_MINUTES),
            )
            .await?;

        self.email.send_otp(email.as_str(), &code, purpose).await?;

        tracing::info!(purpose = purpose.as_str(), "OTP issued");
        Ok(())
    }

    /// Check a code. A matching code is consumed.
    ///
    /// The attempt is counted before the code is compared, so parallel
    /// guesses cannot get past [`MAX_ATTEMPTS`].
    ///
    /// # Errors
    ///
    /// Returns `OtpError::Invalid` with the attempts left for a wrong code,
    /// `OtpError::Expired` or `OtpError::TooManyAttempts` when the code can no
    /// longer be used, and `OtpError::NotFound` when none was issued.
    pub async fn verify(
        &self,
        email: &Email,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<(), OtpError> {
        let Some(record) = self
            .otps
            .claim_attempt(email, purpose.as_str(), MAX_ATTEMPTS)
            .await?
        else {
            let current = self.otps.get(email, purpose.as_str()).await?;
            return Err(unusable_reason(current.as_ref(), Utc::now()));
        };

        if constant_time_compare(&hash_code(code.trim()), &record.code_hash) {
            // Two correct guesses racing: only the one that deletes the row wins.
            if self
                .otps
                .consume(email, purpose.as_str(), &record.code_hash)
                .await?
            {
                return Ok(());
            }
            return Err(OtpError::NotFound);
        }

        Err(wrong_code(record.attempts))
    }
}

/// Generate a 6-digit code.
#[must_use]
pub fn generate_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

/// Hex SHA-256 of a code.
#[must_use]
pub fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Seconds left before a code created at `created_at` may be replaced.
#[must_use]
pub fn cooldown_remaining(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (RESEND_COOLDOWN_SECS - (now - created_at).num_seconds()).max(0)
}

/// Why no attempt could be counted against `record`.
fn unusable_reason(record: Option<&OtpRecord>, now: DateTime<Utc>) -> OtpError {
    match record {
        None => OtpError::NotFound,
        Some(r) if r.expires_at <= now => OtpError::Expired,
        Some(_) => OtpError::TooManyAttempts,
    }
}

/// Error for a wrong guess, given the attempts counted so far.
fn wrong_code(attempts: i32) -> OtpError {
    let remaining = MAX_ATTEMPTS - attempts;
    if remaining <= 0 {
        OtpError::TooManyAttempts
    } else {
        OtpError::Invalid { remaining }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_format() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..1_000_000).contains(&n));
        }
    }

    #[test]
    fn test_hash_code_is_stable_hex() {
        let h = hash_code("123456");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_code("123456"));
        assert_ne!(h, hash_code("123457"));
    }

    #[test]
    fn test_cooldown_remaining() {
        let created = Utc::now();
        assert_eq!(cooldown_remaining(created, created), RESEND_COOLDOWN_SECS);
        assert_eq!(
            cooldown_remaining(created, created + Duration::seconds(45)),
            15
        );
        assert_eq!(
            cooldown_remaining(created, created + Duration::seconds(120)),
            0
        );
    }

    fn record(attempts: i32, expires_in_minutes: i64) -> OtpRecord {
        let now = Utc::now();
        OtpRecord {
            code_hash: hash_code("123456"),
            attempts,
            expires_at: now + Duration::minutes(expires_in_minutes),
            created_at: now,
        }
    }

    #[test]
    fn test_wrong_code_counts_down() {
        assert!(matches!(wrong_code(1), OtpError::Invalid { remaining: 4 }));
        assert!(matches!(wrong_code(MAX_ATTEMPTS - 1), OtpError::Invalid { remaining: 1 }));
        assert!(matches!(wrong_code(MAX_ATTEMPTS), OtpError::TooManyAttempts));
    }

    #[test]
    fn test_unusable_reason() {
        let now = Utc::now();
        assert!(matches!(unusable_reason(None, now), OtpError::NotFound));
        assert!(matches!(
            unusable_reason(Some(&record(0, -1)), now),
            OtpError::Expired
        ));
        assert!(matches!(
            unusable_reason(Some(&record(MAX_ATTEMPTS, 5)), now),
            OtpError::TooManyAttempts
        ));
    }
}
