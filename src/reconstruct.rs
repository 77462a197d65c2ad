use std::fmt::Display;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::models::TransactionDetail;
use crate::node::TxExecResult;

/// Per-block constants filled into every reconstructed transaction.
#[derive(Debug, Clone)]
pub struct TxDefaults {
    pub denom: String,
    pub gas_price: String,
}

impl Default for TxDefaults {
    fn default() -> Self {
        Self {
            denom: "uzeth".to_string(),
            gas_price: "0.025".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasTotals {
    pub gas_used: u64,
    pub gas_wanted: u64,
}

/// Parses `raw`, falling back to `T::default()` when it does not parse.
/// Empty input is an expected absence and is not logged.
pub fn parse_or_default<T>(raw: &str) -> T
where
    T: FromStr + Default,
    T::Err: Display,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return T::default();
    }
    match trimmed.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("unparsable numeric field {:?} ({}); counting as default", raw, e);
            T::default()
        }
    }
}

/// Lowercase hex SHA-256 of the raw transaction bytes.
pub fn tx_hash(raw: &[u8]) -> String {
    hex::encode(Sha256::digest(raw))
}

/// Lazily pairs raw transactions with their execution results by position.
///
/// Only the first `min(txs, results)` positions are produced. Gas totals
/// grow as items are yielded; [`Reconstruction::finish`] drains whatever is
/// left and returns the final totals.
pub struct Reconstruction<'d> {
    pairs: std::iter::Zip<std::vec::IntoIter<Vec<u8>>, std::vec::IntoIter<TxExecResult>>,
    defaults: &'d TxDefaults,
    totals: GasTotals,
    skipped: usize,
}

pub fn reconstruct(
    txs: Vec<Vec<u8>>,
    results: Vec<TxExecResult>,
    defaults: &TxDefaults,
) -> Reconstruction<'_> {
    let skipped = txs.len().saturating_sub(results.len());
    if txs.len() != results.len() {
        warn!(
            "block has {} txs but {} results; reconstructing {}",
            txs.len(),
            results.len(),
            txs.len().min(results.len())
        );
    }
    Reconstruction {
        pairs: txs.into_iter().zip(results),
        defaults,
        totals: GasTotals::default(),
        skipped,
    }
}

impl Reconstruction<'_> {
    /// Raw transactions that had no matching result.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn totals(&self) -> GasTotals {
        self.totals
    }

    pub fn finish(mut self) -> GasTotals {
        for _ in self.by_ref() {}
        self.totals
    }

    fn detail(&self, raw: &[u8], result: TxExecResult) -> TransactionDetail {
        TransactionDetail {
            hash: tx_hash(raw),
            from: String::new(),
            to: String::new(),
            value: String::new(),
            denom: self.defaults.denom.clone(),
            gas_price: self.defaults.gas_price.clone(),
            gas_limit: result.gas_wanted,
            gas_used: result.gas_used,
            nonce: 0,
            input: hex::encode(raw),
            signature: String::new(),
            code: result.code,
            log: result.log,
        }
    }
}

impl Iterator for Reconstruction<'_> {
    type Item = TransactionDetail;

    fn next(&mut self) -> Option<Self::Item> {
        let (raw, result) = self.pairs.next()?;
        let detail = self.detail(&raw, result);
        self.totals.gas_used = self
            .totals
            .gas_used
            .saturating_add(parse_or_default(&detail.gas_used));
        self.totals.gas_wanted = self
            .totals
            .gas_wanted
            .saturating_add(parse_or_default(&detail.gas_limit));
        Some(detail)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pairs.size_hint()
    }
}
