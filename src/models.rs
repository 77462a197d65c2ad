use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-address mining statistics as held by the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MiningRecord {
    /// Unix timestamp of the most recent successful mine.
    pub last_mine_time: i64,
    /// Cumulative reward, in the smallest denomination unit.
    pub total_mined: u64,
    pub mine_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(amount: u64, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MineRequest {
    pub miner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineResponse {
    pub reward: String,
}

/// Mining history as exposed to callers; every field is a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningHistory {
    pub last_mine_time: String,
    pub total_mined: String,
    pub mine_count: String,
}

impl From<Option<MiningRecord>> for MiningHistory {
    fn from(record: Option<MiningRecord>) -> Self {
        let record = record.unwrap_or_default();
        Self {
            last_mine_time: record.last_mine_time.to_string(),
            total_mined: record.total_mined.to_string(),
            mine_count: record.mine_count.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub denom: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub nonce: u64,
    pub input: String,
    pub signature: String,
    pub code: u32,
    pub log: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSummary {
    pub block_height: u64,
    pub block_hash: String,
    /// Placeholder derived from the height, not the previous block's hash.
    pub parent_reference: String,
    /// `last_block_id.hash` exactly as reported by the node, if any.
    pub last_block_hash: Option<String>,
    pub block_time: String,
    pub proposer: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub tx_count: u64,
    pub transactions: Vec<TransactionDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestBlocks {
    pub blocks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStats {
    pub block_height: u64,
    pub total_supply: String,
    pub validator_count: u64,
}
