//! Wallet ledger.
//!
//! The balance column is the sum of the ledger. Every change writes a
//! `wallet_transaction` row and adjusts the balance in the same
//! transaction. Debits are conditional on `balance >= amount`; top-up credits
//! carry the gateway payment id as a unique reference so a retried callback
//! or webhook cannot credit twice.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use threadly_core::{OrderId, UserId, WalletTransactionId, WalletTransactionKind};

use super::RepositoryError;
use crate::models::{Wallet, WalletTransaction};

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i32,
    kind: WalletTransactionKind,
    amount: Decimal,
    description: String,
    order_id: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for WalletTransaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: WalletTransactionId::new(row.id),
            kind: row.kind,
            amount: row.amount,
            description: row.description,
            order_id: row.order_id.map(OrderId::new),
            created_at: row.created_at,
        }
    }
}

/// A completed top-up.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompletedTopup {
    pub user_id: UserId,
    pub amount: Decimal,
}

/// Repository for wallets.
pub struct WalletRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WalletRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's wallet. Users without a wallet row read as zero balance.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Wallet, RepositoryError> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM storefront.wallet WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(Wallet {
            balance: balance.unwrap_or(Decimal::ZERO),
        })
    }

    /// Transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transactions(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r"
            SELECT id, kind, amount, description, order_id, created_at
            FROM storefront.wallet_transaction
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Number of transactions for pagination.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transaction_count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM storefront.wallet_transaction WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Record a pending top-up against a gateway order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_topup(
        &self,
        razorpay_order_id: &str,
        user_id: UserId,
        amount: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO storefront.wallet_topup (razorpay_order_id, user_id, amount) VALUES ($1, $2, $3)",
        )
        .bind(razorpay_order_id)
        .bind(user_id)
        .bind(amount)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Complete a top-up and credit the wallet.
    ///
    /// `user_id` restricts the top-up to one user (the payment callback);
    /// the webhook passes `None`. Returns `None` when the top-up is unknown
    /// or was already completed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn complete_topup(
        &self,
        razorpay_order_id: &str,
        user_id: Option<UserId>,
        payment_id: &str,
    ) -> Result<Option<CompletedTopup>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let topup = sqlx::query_as::<_, CompletedTopup>(
            r"
            UPDATE storefront.wallet_topup
            SET completed_at = NOW()
            WHERE razorpay_order_id = $1
              AND ($2::int IS NULL OR user_id = $2)
              AND completed_at IS NULL
            RETURNING user_id, amount
            ",
        )
        .bind(razorpay_order_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(topup) = topup else {
            return Ok(None);
        };

        let credited = credit(
            &mut *tx,
            topup.user_id,
            topup.amount,
            "Added money to wallet",
            None,
            Some(payment_id),
        )
        .await?;

        tx.commit().await?;
        Ok(credited.then_some(topup))
    }
}

/// Credit a wallet.
///
/// Returns `false` without changing anything when `reference` was already
/// credited.
pub(crate) async fn credit(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
    amount: Decimal,
    description: &str,
    order_id: Option<OrderId>,
    reference: Option<&str>,
) -> Result<bool, RepositoryError> {
    let inserted: Option<i32> = sqlx::query_scalar(
        r"
        INSERT INTO storefront.wallet_transaction
            (user_id, kind, amount, description, order_id, reference)
        VALUES ($1, 'credit', $2, $3, $4, $5)
        ON CONFLICT (reference) DO NOTHING
        RETURNING id
        ",
    )
    .bind(user_id)
    .bind(amount)
    .bind(description)
    .bind(order_id)
    .bind(reference)
    .fetch_optional(&mut *conn)
    .await?;

    if inserted.is_none() {
        return Ok(false);
    }

    sqlx::query(
        r"
        INSERT INTO storefront.wallet (user_id, balance, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET balance = storefront.wallet.balance + EXCLUDED.balance, updated_at = NOW()
        ",
    )
    .bind(user_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    Ok(true)
}

/// Debit a wallet if the balance covers `amount`.
///
/// Returns `false` without changing anything when the balance is too low.
pub(crate) async fn debit(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
    amount: Decimal,
    description: &str,
    order_id: Option<OrderId>,
) -> Result<bool, RepositoryError> {
    let updated = sqlx::query(
        r"
        UPDATE storefront.wallet
        SET balance = balance - $2, updated_at = NOW()
        WHERE user_id = $1 AND balance >= $2
        ",
    )
    .bind(user_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query(
        r"
        INSERT INTO storefront.wallet_transaction (user_id, kind, amount, description, order_id)
        VALUES ($1, 'debit', $2, $3, $4)
        ",
    )
    .bind(user_id)
    .bind(amount)
    .bind(description)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    Ok(true)
}
