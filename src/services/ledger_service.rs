use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{LedgerStore, StoreError};
use crate::models::account::{Account, AccountError, CreateAccountRequest, NewAccount};
use crate::models::transaction::{MovementRequest, NewTransaction, Transaction, TransactionKind};

const MAX_HOLDER_NAME_CHARS: usize = 128;
const MAX_DECIMAL_PLACES: u32 = 2;
/// Largest single amount accepted.
const MAX_AMOUNT: Decimal = dec!(1_000_000_000_000.00);

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Account not found")]
    NotFound,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("no free account number after {0} attempts")]
    AccountNumbersExhausted(u32),
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(_) => LedgerError::NotFound,
            StoreError::Rejected(AccountError::InsufficientBalance { .. }) => {
                LedgerError::InsufficientBalance
            }
            other => LedgerError::Storage(other),
        }
    }
}

/// An account together with its history, newest entry first.
#[derive(Debug, Clone)]
pub struct AccountDetail {
    pub account: Account,
    pub transactions: Vec<Transaction>,
}

pub type AccountNumberSource = Arc<dyn Fn() -> String + Send + Sync>;

/// `"AC"` followed by six random digits.
pub fn generate_account_number() -> String {
    format!("AC{}", rand::rng().random_range(100_000..=999_999))
}

fn normalize_holder_name(input: Option<&str>) -> Result<String, LedgerError> {
    let name = input.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(LedgerError::Validation("Holder name is required"));
    }
    if name.chars().count() > MAX_HOLDER_NAME_CHARS {
        return Err(LedgerError::Validation(
            "Holder name must be at most 128 characters",
        ));
    }
    Ok(name.to_string())
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Accepts JSON numbers and numeric strings; anything else is not an amount.
pub fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                parse_decimal(s)
            }
        }
        _ => None,
    }
}

/// Field-specific messages for amounts that fail the precision or size limit.
struct AmountLimits {
    precision: &'static str,
    too_large: &'static str,
}

const INITIAL_DEPOSIT_LIMITS: AmountLimits = AmountLimits {
    precision: "Initial deposit must have at most two decimal places",
    too_large: "Initial deposit is too large",
};

const MOVEMENT_LIMITS: AmountLimits = AmountLimits {
    precision: "Amount must have at most two decimal places",
    too_large: "Amount is too large",
};

fn to_cents(amount: Decimal, limits: &AmountLimits) -> Result<Decimal, LedgerError> {
    let mut amount = amount.normalize();
    if amount.scale() > MAX_DECIMAL_PLACES {
        return Err(LedgerError::Validation(limits.precision));
    }
    if amount > MAX_AMOUNT {
        return Err(LedgerError::Validation(limits.too_large));
    }
    amount.rescale(MAX_DECIMAL_PLACES);
    Ok(amount)
}

fn validate_initial_deposit(value: Option<&Value>) -> Result<Decimal, LedgerError> {
    let value = match value {
        None | Some(Value::Null) => return Ok(Decimal::ZERO),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(Decimal::ZERO),
        Some(v) => v,
    };

    let amount = parse_amount(value)
        .ok_or(LedgerError::Validation("Initial deposit must be a number"))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::Validation("Initial deposit cannot be negative"));
    }
    to_cents(amount, &INITIAL_DEPOSIT_LIMITS)
}

fn validate_movement_amount(value: Option<&Value>) -> Result<Decimal, LedgerError> {
    let amount = value
        .and_then(parse_amount)
        .filter(|a| *a > Decimal::ZERO)
        .ok_or(LedgerError::Validation("Amount must be > 0"))?;
    to_cents(amount, &MOVEMENT_LIMITS)
}

fn describe(description: Option<String>, kind: TransactionKind) -> String {
    description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| kind.default_description().to_string())
}

/// Validated operations over a [`LedgerStore`].
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    account_numbers: AccountNumberSource,
    max_attempts: u32,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, max_attempts: u32) -> Self {
        Self {
            store,
            account_numbers: Arc::new(generate_account_number),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn with_account_numbers(
        mut self,
        source: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.account_numbers = Arc::new(source);
        self
    }

    pub async fn create_account(&self, req: CreateAccountRequest) -> Result<Account, LedgerError> {
        let holder_name = normalize_holder_name(req.holder_name.as_deref())?;
        let opening_balance = validate_initial_deposit(req.initial_deposit.as_ref())?;

        let opening = (opening_balance > Decimal::ZERO).then(|| NewTransaction {
            kind: TransactionKind::Deposit,
            amount: opening_balance,
            description: "Initial deposit".to_string(),
        });

        for attempt in 1..=self.max_attempts {
            let new_account = NewAccount {
                holder_name: holder_name.clone(),
                account_number: (self.account_numbers)(),
                opening_balance,
            };

            match self.store.create_account(new_account, opening.clone()).await {
                Ok(account) => {
                    tracing::info!(
                        account_id = %account.id,
                        account_number = %account.account_number,
                        opening_balance = %account.balance,
                        "account created"
                    );
                    return Ok(account);
                }
                Err(StoreError::DuplicateAccountNumber(number)) => {
                    tracing::warn!(
                        attempt,
                        %number,
                        "account number collision; regenerating"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(LedgerError::AccountNumbersExhausted(self.max_attempts))
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_accounts().await?)
    }

    pub async fn account_detail(&self, account_id: Uuid) -> Result<AccountDetail, LedgerError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        let transactions = self.store.list_transactions(account.id).await?;

        Ok(AccountDetail {
            account,
            transactions,
        })
    }

    pub async fn deposit(
        &self,
        account_id: Uuid,
        req: MovementRequest,
    ) -> Result<(Account, Transaction), LedgerError> {
        self.move_money(account_id, TransactionKind::Deposit, req)
            .await
    }

    pub async fn withdraw(
        &self,
        account_id: Uuid,
        req: MovementRequest,
    ) -> Result<(Account, Transaction), LedgerError> {
        self.move_money(account_id, TransactionKind::Withdrawal, req)
            .await
    }

    async fn move_money(
        &self,
        account_id: Uuid,
        kind: TransactionKind,
        req: MovementRequest,
    ) -> Result<(Account, Transaction), LedgerError> {
        let amount = validate_movement_amount(req.amount.as_ref())?;
        let entry = NewTransaction {
            kind,
            amount,
            description: describe(req.description, kind),
        };

        match self.store.apply_movement(account_id, entry).await {
            Ok((account, tx)) => {
                tracing::info!(
                    %account_id,
                    kind = kind.as_db_str(),
                    %amount,
                    balance = %account.balance,
                    "movement applied"
                );
                Ok((account, tx))
            }
            Err(err) => {
                tracing::debug!(
                    %account_id,
                    kind = kind.as_db_str(),
                    %amount,
                    error = %err,
                    "movement rejected"
                );
                Err(err.into())
            }
        }
    }

    pub async fn ping(&self) -> Result<(), LedgerError> {
        Ok(self.store.ping().await?)
    }
}
