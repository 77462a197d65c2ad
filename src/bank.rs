use std::future::Future;

use sqlx::SqliteConnection;

use crate::models::Coin;
use crate::storage::{self, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum BankError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid coin {0}")]
    InvalidCoin(String),
    #[error("insufficient funds in {account}: have {available}, need {needed}")]
    InsufficientFunds {
        account: String,
        available: u64,
        needed: u64,
    },
    #[error("amount overflow at {0}")]
    Overflow(String),
    #[error("stored amount at {key} is {len} bytes, expected 8")]
    CorruptAmount { key: String, len: usize },
}

/// The slice of the bank module the mining handler depends on. Every call
/// runs on the caller's store handle so it commits or rolls back with the
/// rest of the transition.
pub trait BankKeeper: Send + Sync {
    fn mint_coins(
        &self,
        conn: &mut SqliteConnection,
        module: &str,
        coin: &Coin,
    ) -> impl Future<Output = Result<(), BankError>> + Send;

    fn send_coins_from_module_to_account(
        &self,
        conn: &mut SqliteConnection,
        module: &str,
        recipient: &str,
        coin: &Coin,
    ) -> impl Future<Output = Result<(), BankError>> + Send;

    fn balance(
        &self,
        conn: &mut SqliteConnection,
        account: &str,
        denom: &str,
    ) -> impl Future<Output = Result<u64, BankError>> + Send;

    fn supply_of(
        &self,
        conn: &mut SqliteConnection,
        denom: &str,
    ) -> impl Future<Output = Result<u64, BankError>> + Send;
}

/// Balances and supply kept in the shared KV store under `bank/`.
#[derive(Debug, Clone, Default)]
pub struct StoreBank;

pub fn module_account(module: &str) -> String {
    format!("module/{}", module)
}

fn balance_key(account: &str, denom: &str) -> Vec<u8> {
    format!("bank/balances/{}/{}", account, denom).into_bytes()
}

fn supply_key(denom: &str) -> Vec<u8> {
    format!("bank/supply/{}", denom).into_bytes()
}

async fn read_amount(conn: &mut SqliteConnection, key: &[u8]) -> Result<u64, BankError> {
    match storage::kv_get(conn, key).await? {
        None => Ok(0),
        Some(bytes) => {
            let word: [u8; 8] = bytes.as_slice().try_into().map_err(|_| BankError::CorruptAmount {
                key: String::from_utf8_lossy(key).into_owned(),
                len: bytes.len(),
            })?;
            Ok(u64::from_be_bytes(word))
        }
    }
}

async fn write_amount(conn: &mut SqliteConnection, key: &[u8], amount: u64) -> Result<(), BankError> {
    storage::kv_set(conn, key, &amount.to_be_bytes()).await?;
    Ok(())
}

async fn credit(conn: &mut SqliteConnection, key: &[u8], amount: u64) -> Result<(), BankError> {
    let current = read_amount(conn, key).await?;
    let next = current
        .checked_add(amount)
        .ok_or_else(|| BankError::Overflow(String::from_utf8_lossy(key).into_owned()))?;
    write_amount(conn, key, next).await
}

fn validate(coin: &Coin) -> Result<(), BankError> {
    if coin.amount == 0 || coin.denom.is_empty() {
        return Err(BankError::InvalidCoin(coin.to_string()));
    }
    Ok(())
}

impl BankKeeper for StoreBank {
    async fn mint_coins(
        &self,
        conn: &mut SqliteConnection,
        module: &str,
        coin: &Coin,
    ) -> Result<(), BankError> {
        validate(coin)?;
        credit(conn, &supply_key(&coin.denom), coin.amount).await?;
        credit(conn, &balance_key(&module_account(module), &coin.denom), coin.amount).await
    }

    async fn send_coins_from_module_to_account(
        &self,
        conn: &mut SqliteConnection,
        module: &str,
        recipient: &str,
        coin: &Coin,
    ) -> Result<(), BankError> {
        validate(coin)?;
        let from = module_account(module);
        let from_key = balance_key(&from, &coin.denom);
        let available = read_amount(conn, &from_key).await?;
        if available < coin.amount {
            return Err(BankError::InsufficientFunds {
                account: from,
                available,
                needed: coin.amount,
            });
        }
        write_amount(conn, &from_key, available - coin.amount).await?;
        credit(conn, &balance_key(recipient, &coin.denom), coin.amount).await
    }

    async fn balance(
        &self,
        conn: &mut SqliteConnection,
        account: &str,
        denom: &str,
    ) -> Result<u64, BankError> {
        read_amount(conn, &balance_key(account, denom)).await
    }

    async fn supply_of(&self, conn: &mut SqliteConnection, denom: &str) -> Result<u64, BankError> {
        read_amount(conn, &supply_key(denom)).await
    }
}
