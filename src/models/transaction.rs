use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::account::{Account, AccountResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

// convert rust enum for psql
impl TransactionKind {
    pub fn as_db_str(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionKind::Deposit),
            "withdrawal" => Some(TransactionKind::Withdrawal),
            _ => None,
        }
    }

    /// Description recorded when the caller leaves it blank.
    pub fn default_description(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdrawal => "Withdrawal",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Effect of this entry on the owning account's balance.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Deposit => self.amount,
            TransactionKind::Withdrawal => -self.amount,
        }
    }
}

/// A validated ledger entry that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
}

/// Body of both `/deposit` and `/withdraw`. `amount` stays untyped so that
/// numeric strings are accepted and garbage is reported as a validation
/// error rather than a JSON rejection.
#[derive(Debug, Default, Deserialize)]
pub struct MovementRequest {
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: Uuid,
    pub account: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            account: t.account_id,
            kind: t.kind,
            amount: t.amount,
            description: t.description,
            created_at: t.created_at,
        }
    }
}

/// Reply to a deposit or withdrawal.
#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub account: AccountResponse,
    pub transaction: TransactionResponse,
}

impl From<(Account, Transaction)> for MovementResponse {
    fn from((account, transaction): (Account, Transaction)) -> Self {
        Self {
            account: account.into(),
            transaction: transaction.into(),
        }
    }
}
