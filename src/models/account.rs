use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::transaction::{NewTransaction, Transaction, TransactionKind, TransactionResponse};

/// Business rules an account enforces on a money movement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Insufficient balance")]
    InsufficientBalance { balance: Decimal, requested: Decimal },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub holder_name: String,
    pub account_number: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Balance after `entry`, or the rule it breaks. Nothing is mutated, so
    /// stores call this while holding their lock and write the result
    /// together with the entry.
    pub fn balance_after(&self, entry: &NewTransaction) -> Result<Decimal, AccountError> {
        match entry.kind {
            TransactionKind::Deposit => Ok(self.balance + entry.amount),
            TransactionKind::Withdrawal => {
                if self.balance >= entry.amount {
                    Ok(self.balance - entry.amount)
                } else {
                    Err(AccountError::InsufficientBalance {
                        balance: self.balance,
                        requested: entry.amount,
                    })
                }
            }
        }
    }
}

/// Everything a store needs to insert an account row.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub holder_name: String,
    pub account_number: String,
    pub opening_balance: Decimal,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub initial_deposit: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub holder_name: String,
    pub account_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            holder_name: a.holder_name,
            account_number: a.account_number,
            balance: a.balance,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountDetailResponse {
    pub account: AccountResponse,
    pub transactions: Vec<TransactionResponse>,
}

impl AccountDetailResponse {
    pub fn new(account: Account, transactions: Vec<Transaction>) -> Self {
        Self {
            account: account.into(),
            transactions: transactions.into_iter().map(TransactionResponse::from).collect(),
        }
    }
}
