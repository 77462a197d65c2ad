use sqlx::SqliteConnection;
use tracing::{error, warn};

use crate::codec;
use crate::models::MiningRecord;
use crate::storage::{self, StoreError};

/// Reserved for ledger entries; no other store entity may use it.
pub const MINING_RECORD_PREFIX: &[u8] = b"mining_record/";

pub fn mining_record_key(address: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(MINING_RECORD_PREFIX.len() + address.len());
    key.extend_from_slice(MINING_RECORD_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key
}

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Store(StoreError),
    /// The enclosing transition must be aborted.
    #[error("fatal: mining record write failed for {address}: {source}")]
    StoreWrite {
        address: String,
        #[source]
        source: StoreError,
    },
    #[error("{field} overflow for {address}")]
    Overflow {
        address: String,
        field: &'static str,
    },
}

impl LedgerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::StoreWrite { .. })
    }
}

/// Mining records over a store handle borrowed for one transition.
pub struct MiningLedger<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> MiningLedger<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&mut self, address: &str) -> Result<Option<MiningRecord>, LedgerError> {
        let key = mining_record_key(address);
        let Some(bytes) = storage::kv_get(&mut *self.conn, &key)
            .await
            .map_err(LedgerError::Store)?
        else {
            return Ok(None);
        };

        let record = codec::decode(&bytes);
        if record.is_none() {
            warn!(
                "mining record for {} is truncated ({} bytes); treating as absent",
                address,
                bytes.len()
            );
        }
        Ok(record)
    }

    pub async fn set(&mut self, address: &str, record: &MiningRecord) -> Result<(), LedgerError> {
        let key = mining_record_key(address);
        let bytes = codec::encode(record);
        storage::kv_set(&mut *self.conn, &key, &bytes)
            .await
            .map_err(|source| {
                error!("mining record write failed for {}: {}", address, source);
                LedgerError::StoreWrite {
                    address: address.to_string(),
                    source,
                }
            })
    }

    /// Folds one successful mine into the address's record and writes it back.
    pub async fn update_on_mine(
        &mut self,
        address: &str,
        reward: u64,
        now: i64,
    ) -> Result<MiningRecord, LedgerError> {
        let record = match self.get(address).await? {
            None => MiningRecord {
                last_mine_time: now,
                total_mined: reward,
                mine_count: 1,
            },
            Some(existing) => MiningRecord {
                last_mine_time: now,
                total_mined: existing.total_mined.checked_add(reward).ok_or_else(|| {
                    LedgerError::Overflow {
                        address: address.to_string(),
                        field: "total_mined",
                    }
                })?,
                mine_count: existing.mine_count.checked_add(1).ok_or_else(|| {
                    LedgerError::Overflow {
                        address: address.to_string(),
                        field: "mine_count",
                    }
                })?,
            },
        };

        self.set(address, &record).await?;
        Ok(record)
    }
}
