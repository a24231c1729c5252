//! Wallet types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use threadly_core::{OrderId, WalletTransactionId, WalletTransactionKind};

/// A user's wallet balance.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub balance: Decimal,
}

/// One credit or debit.
#[derive(Debug, Clone)]
pub struct WalletTransaction {
    pub id: WalletTransactionId,
    pub kind: WalletTransactionKind,
    pub amount: Decimal,
    pub description: String,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}
