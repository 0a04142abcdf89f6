pub mod memory;
pub mod pool;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::account::{Account, AccountError, NewAccount};
use crate::models::transaction::{NewTransaction, Transaction};

pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account number {0} is already taken")]
    DuplicateAccountNumber(String),
    #[error("account {0} not found")]
    AccountNotFound(Uuid),
    #[error(transparent)]
    Rejected(#[from] AccountError),
    #[error("opening entry of {entry} does not match opening balance {balance}")]
    OpeningMismatch { entry: Decimal, balance: Decimal },
    #[error("unknown transaction kind `{0}` in storage")]
    UnknownTransactionKind(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for accounts and their append-only transaction history.
///
/// Implementations must apply a movement as one unit: the balance check,
/// the balance write and the ledger entry either all happen or none do, and
/// concurrent movements on the same account are serialized.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts the account and, when given, its opening ledger entry.
    /// Fails with [`StoreError::DuplicateAccountNumber`] when the number is
    /// in use so the caller can pick another one.
    async fn create_account(
        &self,
        account: NewAccount,
        opening: Option<NewTransaction>,
    ) -> StoreResult<Account>;

    /// All accounts, newest first.
    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    async fn get_account(&self, account_id: Uuid) -> StoreResult<Option<Account>>;

    /// Ledger entries of one account, newest first.
    async fn list_transactions(&self, account_id: Uuid) -> StoreResult<Vec<Transaction>>;

    /// Applies a deposit or withdrawal and records it.
    async fn apply_movement(
        &self,
        account_id: Uuid,
        entry: NewTransaction,
    ) -> StoreResult<(Account, Transaction)>;

    async fn ping(&self) -> StoreResult<()>;
}

fn check_opening(account: &NewAccount, opening: Option<&NewTransaction>) -> StoreResult<()> {
    let entry = opening.map_or(Decimal::ZERO, |tx| tx.amount);
    if entry != account.opening_balance {
        return Err(StoreError::OpeningMismatch {
            entry,
            balance: account.opening_balance,
        });
    }
    Ok(())
}
