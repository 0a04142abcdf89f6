use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

use super::{LedgerStore, StoreError, StoreResult, check_opening};
use crate::models::account::{Account, NewAccount};
use crate::models::transaction::{NewTransaction, Transaction, TransactionKind};

const SCHEMA: &str = include_str!("schema.sql");

type AccountRow = (Uuid, String, String, Decimal, DateTime<Utc>, DateTime<Utc>);
type TransactionRow = (Uuid, Uuid, String, Decimal, String, DateTime<Utc>);

fn account_from_row(row: AccountRow) -> Account {
    let (id, holder_name, account_number, balance, created_at, updated_at) = row;
    Account {
        id,
        holder_name,
        account_number,
        balance,
        created_at,
        updated_at,
    }
}

fn transaction_from_row(row: TransactionRow) -> StoreResult<Transaction> {
    let (id, account_id, kind, amount, description, created_at) = row;
    let kind =
        TransactionKind::from_db_str(&kind).ok_or(StoreError::UnknownTransactionKind(kind))?;
    Ok(Transaction {
        id,
        account_id,
        kind,
        amount,
        description,
        created_at,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };

    db_err.code().is_some_and(|c| c == "23505")
}

/// Postgres-backed store. Movements lock the account row for the length of
/// one SQL transaction.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables if they are missing. Safe to run on every start.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

async fn lock_account_for_update(
    tx: &mut SqlxTransaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<Option<Account>, sqlx::Error> {
    let q = r#"
        SELECT id, holder_name, account_number, balance, created_at, updated_at
        FROM accounts
        WHERE id = $1
        FOR UPDATE
    "#;

    let row: Option<AccountRow> = sqlx::query_as(q)
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row.map(account_from_row))
}

async fn update_balance(
    tx: &mut SqlxTransaction<'_, Postgres>,
    account_id: Uuid,
    new_balance: Decimal,
) -> Result<Account, sqlx::Error> {
    let q = r#"
        UPDATE accounts
        SET balance = $1, updated_at = now()
        WHERE id = $2
        RETURNING id, holder_name, account_number, balance, created_at, updated_at
    "#;

    let row: AccountRow = sqlx::query_as(q)
        .bind(new_balance)
        .bind(account_id)
        .fetch_one(&mut **tx)
        .await?;

    Ok(account_from_row(row))
}

async fn insert_transaction_row(
    tx: &mut SqlxTransaction<'_, Postgres>,
    account_id: Uuid,
    entry: &NewTransaction,
) -> Result<(Uuid, DateTime<Utc>), sqlx::Error> {
    let q = r#"
        INSERT INTO transactions (account_id, kind, amount, description)
        VALUES ($1, $2, $3, $4)
        RETURNING id, created_at
    "#;

    let (id, created_at): (Uuid, DateTime<Utc>) = sqlx::query_as(q)
        .bind(account_id)
        .bind(entry.kind.as_db_str())
        .bind(entry.amount)
        .bind(&entry.description)
        .fetch_one(&mut **tx)
        .await?;

    Ok((id, created_at))
}

async fn record(
    tx: &mut SqlxTransaction<'_, Postgres>,
    account_id: Uuid,
    entry: NewTransaction,
) -> Result<Transaction, sqlx::Error> {
    let (id, created_at) = insert_transaction_row(tx, account_id, &entry).await?;
    Ok(Transaction {
        id,
        account_id,
        kind: entry.kind,
        amount: entry.amount,
        description: entry.description,
        created_at,
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_account(
        &self,
        account: NewAccount,
        opening: Option<NewTransaction>,
    ) -> StoreResult<Account> {
        check_opening(&account, opening.as_ref())?;

        let mut tx = self.pool.begin().await?;

        let q = r#"
            INSERT INTO accounts (holder_name, account_number, balance)
            VALUES ($1, $2, $3)
            RETURNING id, holder_name, account_number, balance, created_at, updated_at
        "#;

        let row: AccountRow = match sqlx::query_as(q)
            .bind(&account.holder_name)
            .bind(&account.account_number)
            .bind(account.opening_balance)
            .fetch_one(&mut *tx)
            .await
        {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::DuplicateAccountNumber(account.account_number));
            }
            Err(e) => return Err(e.into()),
        };
        let created = account_from_row(row);

        if let Some(entry) = opening {
            record(&mut tx, created.id, entry).await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let q = r#"
            SELECT id, holder_name, account_number, balance, created_at, updated_at
            FROM accounts
            ORDER BY created_at DESC, seq DESC
        "#;

        let rows: Vec<AccountRow> = sqlx::query_as(q).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(account_from_row).collect())
    }

    async fn get_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        let q = r#"
            SELECT id, holder_name, account_number, balance, created_at, updated_at
            FROM accounts
            WHERE id = $1
            LIMIT 1
        "#;

        let row: Option<AccountRow> = sqlx::query_as(q)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(account_from_row))
    }

    async fn list_transactions(&self, account_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let q = r#"
            SELECT id, account_id, kind, amount, description, created_at
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at DESC, seq DESC
        "#;

        let rows: Vec<TransactionRow> = sqlx::query_as(q)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn apply_movement(
        &self,
        account_id: Uuid,
        entry: NewTransaction,
    ) -> StoreResult<(Account, Transaction)> {
        // Dropping `tx` on any early return rolls the whole movement back.
        let mut tx = self.pool.begin().await?;

        let current = lock_account_for_update(&mut tx, account_id)
            .await?
            .ok_or(StoreError::AccountNotFound(account_id))?;

        let new_balance = current.balance_after(&entry)?;

        let account = update_balance(&mut tx, account_id, new_balance).await?;
        let recorded = record(&mut tx, account_id, entry).await?;

        tx.commit().await?;
        Ok((account, recorded))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
