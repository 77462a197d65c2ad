use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct ServiceStats {
    mines: AtomicU64,
    block_queries: AtomicU64,
    transactions_reconstructed: AtomicU64,
    transactions_skipped: AtomicU64,
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStats {
    pub const fn new() -> Self {
        Self {
            mines: AtomicU64::new(0),
            block_queries: AtomicU64::new(0),
            transactions_reconstructed: AtomicU64::new(0),
            transactions_skipped: AtomicU64::new(0),
        }
    }

    pub fn inc_mines(&self, n: u64) {
        self.mines.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_block_queries(&self, n: u64) {
        self.block_queries.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_transactions_reconstructed(&self, n: u64) {
        self.transactions_reconstructed.fetch_add(n, Ordering::Relaxed);
    }

    /// Raw transactions dropped because the results list was shorter.
    pub fn inc_transactions_skipped(&self, n: u64) {
        self.transactions_skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            mines: self.mines.load(Ordering::Relaxed),
            block_queries: self.block_queries.load(Ordering::Relaxed),
            transactions_reconstructed: self.transactions_reconstructed.load(Ordering::Relaxed),
            transactions_skipped: self.transactions_skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceSnapshot {
    pub mines: u64,
    pub block_queries: u64,
    pub transactions_reconstructed: u64,
    pub transactions_skipped: u64,
}

pub static SERVICE_STATS: ServiceStats = ServiceStats::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let stats = ServiceStats::new();
        stats.inc_mines(2);
        stats.inc_transactions_reconstructed(5);
        stats.inc_transactions_skipped(1);
        let snap = stats.snapshot();
        assert_eq!(snap.mines, 2);
        assert_eq!(snap.block_queries, 0);
        assert_eq!(snap.transactions_reconstructed, 5);
        assert_eq!(snap.transactions_skipped, 1);
    }
}
