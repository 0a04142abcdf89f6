use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{LedgerStore, StoreError, StoreResult, check_opening};
use crate::models::account::{Account, NewAccount};
use crate::models::transaction::{NewTransaction, Transaction};

#[derive(Default)]
struct Ledger {
    // insertion order doubles as creation order
    accounts: Vec<Account>,
    index: HashMap<Uuid, usize>,
    transactions: HashMap<Uuid, Vec<Transaction>>,
}

impl Ledger {
    fn number_taken(&self, account_number: &str) -> bool {
        self.accounts
            .iter()
            .any(|a| a.account_number == account_number)
    }

    fn record(&mut self, account_id: Uuid, entry: NewTransaction) -> Transaction {
        let tx = Transaction {
            id: Uuid::new_v4(),
            account_id,
            kind: entry.kind,
            amount: entry.amount,
            description: entry.description,
            created_at: Utc::now(),
        };
        self.transactions
            .entry(account_id)
            .or_default()
            .push(tx.clone());
        tx
    }
}

/// Process-local store. Every mutation runs under a single write lock, which
/// makes each movement atomic and serializes movements on an account.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    ledger: Arc<RwLock<Ledger>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_account(
        &self,
        account: NewAccount,
        opening: Option<NewTransaction>,
    ) -> StoreResult<Account> {
        check_opening(&account, opening.as_ref())?;

        let mut ledger = self.ledger.write();
        if ledger.number_taken(&account.account_number) {
            return Err(StoreError::DuplicateAccountNumber(account.account_number));
        }

        let now = Utc::now();
        let created = Account {
            id: Uuid::new_v4(),
            holder_name: account.holder_name,
            account_number: account.account_number,
            balance: account.opening_balance,
            created_at: now,
            updated_at: now,
        };
        let slot = ledger.accounts.len();
        ledger.index.insert(created.id, slot);
        ledger.accounts.push(created.clone());
        if let Some(entry) = opening {
            ledger.record(created.id, entry);
        }

        Ok(created)
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let ledger = self.ledger.read();
        Ok(ledger.accounts.iter().rev().cloned().collect())
    }

    async fn get_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        let ledger = self.ledger.read();
        Ok(ledger
            .index
            .get(&account_id)
            .map(|&slot| ledger.accounts[slot].clone()))
    }

    async fn list_transactions(&self, account_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let ledger = self.ledger.read();
        Ok(ledger
            .transactions
            .get(&account_id)
            .map(|txs| txs.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn apply_movement(
        &self,
        account_id: Uuid,
        entry: NewTransaction,
    ) -> StoreResult<(Account, Transaction)> {
        let mut ledger = self.ledger.write();
        let slot = *ledger
            .index
            .get(&account_id)
            .ok_or(StoreError::AccountNotFound(account_id))?;

        let new_balance = ledger.accounts[slot].balance_after(&entry)?;

        let account = &mut ledger.accounts[slot];
        account.balance = new_balance;
        account.updated_at = Utc::now();
        let account = account.clone();

        let tx = ledger.record(account_id, entry);
        Ok((account, tx))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
