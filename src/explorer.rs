use tracing::info;

use crate::models::{BlockSummary, ChainStats, LatestBlocks};
use crate::node::{FetchError, NodeClient, NodeQuery, RawBlock, TxExecResult};
use crate::reconstruct::{reconstruct, TxDefaults};
use crate::service_stats::SERVICE_STATS;

pub const DEFAULT_LATEST_LIMIT: u32 = 10;
pub const MAX_LATEST_LIMIT: u32 = 100;

/// `0` and anything past the tip mean "latest".
pub fn resolve_height(requested: u64, current: u64) -> u64 {
    if requested == 0 || requested > current {
        current
    } else {
        requested
    }
}

/// Stand-in for the previous block's hash: the previous height as 64 hex
/// digits. Not a cryptographic link; see `BlockSummary::last_block_hash`
/// for the hash the node reports.
pub fn parent_reference(height: u64) -> String {
    if height > 1 {
        format!("{:064x}", height - 1)
    } else {
        "0".repeat(64)
    }
}

pub fn latest_heights(current: u64, limit: u32) -> Vec<u64> {
    let limit = if limit == 0 || limit > MAX_LATEST_LIMIT {
        DEFAULT_LATEST_LIMIT
    } else {
        limit
    };
    (0..u64::from(limit))
        .map_while(|i| current.checked_sub(i).filter(|h| *h >= 1))
        .collect()
}

/// The node must answer with the block that was asked for.
pub fn check_height(requested: u64, block: &RawBlock) -> Result<(), FetchError> {
    if block.height != requested {
        return Err(FetchError::Decode {
            query: NodeQuery::Block,
            reason: format!("asked for height {}, node returned {}", requested, block.height),
        });
    }
    Ok(())
}

/// Builds the summary for `height` from the two node payloads.
pub fn assemble(
    height: u64,
    block: RawBlock,
    results: Vec<TxExecResult>,
    defaults: &TxDefaults,
) -> BlockSummary {
    let tx_count = block.txs.len() as u64;
    let mut recon = reconstruct(block.txs, results, defaults);
    let transactions: Vec<_> = recon.by_ref().collect();
    let skipped = recon.skipped() as u64;
    let totals = recon.finish();

    SERVICE_STATS.inc_transactions_reconstructed(transactions.len() as u64);
    SERVICE_STATS.inc_transactions_skipped(skipped);

    BlockSummary {
        block_height: height,
        block_hash: block.hash,
        parent_reference: parent_reference(height),
        last_block_hash: block.last_block_hash,
        block_time: block.time,
        proposer: block.proposer,
        gas_limit: totals.gas_wanted.to_string(),
        gas_used: totals.gas_used.to_string(),
        tx_count,
        transactions,
    }
}

#[derive(Clone)]
pub struct Explorer {
    node: NodeClient,
    defaults: TxDefaults,
    genesis_supply: u64,
}

impl Explorer {
    pub fn new(node: NodeClient, defaults: TxDefaults, genesis_supply: u64) -> Self {
        Self {
            node,
            defaults,
            genesis_supply,
        }
    }

    pub fn node(&self) -> &NodeClient {
        &self.node
    }

    pub async fn block_info(&self, requested: u64) -> Result<BlockSummary, FetchError> {
        let current = self.node.status().await?.latest_block_height;
        let height = resolve_height(requested, current);
        let (block, results) = self.node.fetch_pair(height).await?;
        check_height(height, &block)?;
        SERVICE_STATS.inc_block_queries(1);

        let summary = assemble(height, block, results, &self.defaults);
        info!(
            "block {} reconstructed: {}/{} txs, gas {}/{}",
            height,
            summary.transactions.len(),
            summary.tx_count,
            summary.gas_used,
            summary.gas_limit
        );
        Ok(summary)
    }

    pub async fn latest_blocks(&self, limit: u32) -> Result<LatestBlocks, FetchError> {
        let current = self.node.status().await?.latest_block_height;
        let blocks = latest_heights(current, limit)
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Ok(LatestBlocks { blocks })
    }

    /// `minted` is the reward denom supply issued on top of genesis.
    pub async fn chain_stats(&self, minted: u64) -> Result<ChainStats, FetchError> {
        let (status, validator_count) =
            tokio::try_join!(self.node.status(), self.node.validator_count())?;
        Ok(ChainStats {
            block_height: status.latest_block_height,
            total_supply: u128::from(self.genesis_supply)
                .saturating_add(u128::from(minted))
                .to_string(),
            validator_count,
        })
    }
}
