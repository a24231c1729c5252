//! One-time password storage.
//!
//! At most one live code exists per (email, purpose). Issuing a new code
//! replaces the old one and resets the attempt counter.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use threadly_core::Email;

use super::RepositoryError;

/// A stored OTP.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRecord {
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Repository for OTP database operations.
pub struct OtpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OtpRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new code, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        email: &Email,
        purpose: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.email_otp (email, purpose, code_hash, attempts, expires_at, created_at)
            VALUES ($1, $2, $3, 0, $4, NOW())
            ON CONFLICT (email, purpose) DO UPDATE
            SET code_hash = EXCLUDED.code_hash,
                attempts = 0,
                expires_at = EXCLUDED.expires_at,
                created_at = NOW()
            ",
        )
        .bind(email.as_str())
        .bind(purpose)
        .bind(code_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Get the live code for an email and purpose.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        email: &Email,
        purpose: &str,
    ) -> Result<Option<OtpRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, OtpRecord>(
            r"
            SELECT code_hash, attempts, expires_at, created_at
            FROM storefront.email_otp
            WHERE email = $1 AND purpose = $2
            ",
        )
        .bind(email.as_str())
        .bind(purpose)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Count one attempt against a live code and return it with the new count.
    ///
    /// Returns `None` when there is no code, it has expired, or it has already
    /// used `max_attempts`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claim_attempt(
        &self,
        email: &Email,
        purpose: &str,
        max_attempts: i32,
    ) -> Result<Option<OtpRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, OtpRecord>(
            r"
            UPDATE storefront.email_otp
            SET attempts = attempts + 1
            WHERE email = $1 AND purpose = $2
              AND attempts < $3
              AND expires_at > NOW()
            RETURNING code_hash, attempts, expires_at, created_at
            ",
        )
        .bind(email.as_str())
        .bind(purpose)
        .bind(max_attempts)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Delete a code after a correct guess. Returns false if another request
    /// already consumed or replaced it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume(
        &self,
        email: &Email,
        purpose: &str,
        code_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM storefront.email_otp WHERE email = $1 AND purpose = $2 AND code_hash = $3",
        )
        .bind(email.as_str())
        .bind(purpose)
        .bind(code_hash)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
