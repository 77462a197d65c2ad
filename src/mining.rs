use tokio::sync::Mutex;
use tracing::info;

use crate::address::{AddressCodec, AddressError};
use crate::bank::{BankError, BankKeeper};
use crate::ledger::{LedgerError, MiningLedger};
use crate::models::{Coin, MineRequest, MineResponse, MiningHistory};
use crate::service_stats::SERVICE_STATS;
use crate::storage::{self, DbPool, StoreError};

/// Module account the reward is minted into before it reaches the miner.
pub const MINING_MODULE: &str = "mining";

#[derive(thiserror::Error, Debug)]
pub enum MiningError {
    #[error("invalid request: {0}")]
    InvalidArgument(&'static str),
    #[error("invalid miner address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("failed to mint mining reward: {0}")]
    Mint(#[source] BankError),
    #[error("failed to send mining reward: {0}")]
    Send(#[source] BankError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues the fixed mining reward and keeps the per-address ledger in step.
pub struct MiningService<B, A> {
    pool: DbPool,
    bank: B,
    codec: A,
    reward: Coin,
    // Every mine rewrites the shared supply key; one transition at a time.
    write_lock: Mutex<()>,
}

impl<B: BankKeeper, A: AddressCodec> MiningService<B, A> {
    pub fn new(pool: DbPool, bank: B, codec: A, reward: Coin) -> Self {
        Self {
            pool,
            bank,
            codec,
            reward,
            write_lock: Mutex::new(()),
        }
    }

    pub fn reward(&self) -> &Coin {
        &self.reward
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Checks the request without touching the store. Returns the canonical
    /// account the reward is paid to.
    pub fn validate(&self, req: &MineRequest) -> Result<String, MiningError> {
        if req.miner.trim().is_empty() {
            return Err(MiningError::InvalidArgument("miner address cannot be empty"));
        }
        Ok(self.codec.canonical(&req.miner)?)
    }

    /// Mint, transfer and record the reward in one transition. Nothing is
    /// committed unless all three steps succeed.
    ///
    /// The bank credits the canonical account; the ledger is keyed by the
    /// address as submitted.
    pub async fn mine(&self, req: &MineRequest, block_time: i64) -> Result<MineResponse, MiningError> {
        let account = self.validate(req)?;

        let _guard = self.write_lock.lock().await;
        let mut tx = storage::begin_transition(&self.pool).await?;

        self.bank
            .mint_coins(&mut tx, MINING_MODULE, &self.reward)
            .await
            .map_err(MiningError::Mint)?;
        self.bank
            .send_coins_from_module_to_account(&mut tx, MINING_MODULE, &account, &self.reward)
            .await
            .map_err(MiningError::Send)?;

        let record = MiningLedger::new(&mut tx)
            .update_on_mine(&req.miner, self.reward.amount, block_time)
            .await?;

        storage::commit_transition(tx).await?;

        SERVICE_STATS.inc_mines(1);
        info!(
            "issued {} to {} (mine #{}, total {})",
            self.reward, req.miner, record.mine_count, record.total_mined
        );

        Ok(MineResponse {
            reward: self.reward.to_string(),
        })
    }

    pub async fn history(&self, address: &str) -> Result<MiningHistory, MiningError> {
        if address.trim().is_empty() {
            return Err(MiningError::InvalidArgument("address cannot be empty"));
        }
        let mut conn = storage::acquire(&self.pool).await?;
        let record = MiningLedger::new(&mut conn).get(address).await?;
        Ok(MiningHistory::from(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{encode_address, Bech32Codec};
    use crate::bank::{module_account, StoreBank};
    use crate::storage::{init_pool, memory_pool};
    use sqlx::SqliteConnection;
    use std::sync::Arc;

    #[derive(Clone, Copy)]
    enum FailAt {
        Mint,
        Send,
    }

    struct FailingBank {
        inner: StoreBank,
        fail_at: FailAt,
    }

    impl BankKeeper for FailingBank {
        async fn mint_coins(
            &self,
            conn: &mut SqliteConnection,
            module: &str,
            coin: &Coin,
        ) -> Result<(), BankError> {
            match self.fail_at {
                FailAt::Mint => Err(BankError::InvalidCoin(coin.to_string())),
                FailAt::Send => self.inner.mint_coins(conn, module, coin).await,
            }
        }

        async fn send_coins_from_module_to_account(
            &self,
            _conn: &mut SqliteConnection,
            module: &str,
            _recipient: &str,
            coin: &Coin,
        ) -> Result<(), BankError> {
            Err(BankError::InsufficientFunds {
                account: module_account(module),
                available: 0,
                needed: coin.amount,
            })
        }

        async fn balance(
            &self,
            conn: &mut SqliteConnection,
            account: &str,
            denom: &str,
        ) -> Result<u64, BankError> {
            self.inner.balance(conn, account, denom).await
        }

        async fn supply_of(&self, conn: &mut SqliteConnection, denom: &str) -> Result<u64, BankError> {
            self.inner.supply_of(conn, denom).await
        }
    }

    fn miner() -> String {
        encode_address("zeth", &[3u8; 20]).unwrap()
    }

    fn reward() -> Coin {
        Coin::new(100_000_000, "uzeth")
    }

    #[tokio::test]
    async fn mine_credits_miner_and_records_history() {
        let pool = memory_pool().await;
        let service = MiningService::new(pool, StoreBank, Bech32Codec::new("zeth"), reward());
        let req = MineRequest { miner: miner() };

        let res = service.mine(&req, 1000).await.unwrap();
        assert_eq!(res.reward, "100000000uzeth");

        let history = service.history(&req.miner).await.unwrap();
        assert_eq!(history.last_mine_time, "1000");
        assert_eq!(history.total_mined, "100000000");
        assert_eq!(history.mine_count, "1");

        service.mine(&req, 1060).await.unwrap();
        let history = service.history(&req.miner).await.unwrap();
        assert_eq!(history.last_mine_time, "1060");
        assert_eq!(history.total_mined, "200000000");
        assert_eq!(history.mine_count, "2");

        let mut conn = service.pool().acquire().await.unwrap();
        assert_eq!(
            service.bank().balance(&mut conn, &req.miner, "uzeth").await.unwrap(),
            200_000_000
        );
    }

    #[tokio::test]
    async fn empty_and_malformed_addresses_are_rejected() {
        let pool = memory_pool().await;
        let service = MiningService::new(pool, StoreBank, Bech32Codec::new("zeth"), reward());

        let err = service
            .mine(&MineRequest { miner: "".into() }, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, MiningError::InvalidArgument(_)));

        let err = service
            .mine(&MineRequest { miner: "addrA".into() }, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, MiningError::InvalidAddress(_)));

        let history = service.history("addrA").await.unwrap();
        assert_eq!(history.mine_count, "0");
    }

    #[tokio::test]
    async fn failed_mint_leaves_no_record() {
        let pool = memory_pool().await;
        let bank = FailingBank {
            inner: StoreBank,
            fail_at: FailAt::Mint,
        };
        let service = MiningService::new(pool, bank, Bech32Codec::new("zeth"), reward());
        let req = MineRequest { miner: miner() };

        let err = service.mine(&req, 1000).await.unwrap_err();
        assert!(matches!(err, MiningError::Mint(_)));
        assert_eq!(service.history(&req.miner).await.unwrap().mine_count, "0");
    }

    #[tokio::test]
    async fn failed_send_rolls_back_the_mint() {
        let pool = memory_pool().await;
        let bank = FailingBank {
            inner: StoreBank,
            fail_at: FailAt::Send,
        };
        let service = MiningService::new(pool, bank, Bech32Codec::new("zeth"), reward());
        let req = MineRequest { miner: miner() };

        let err = service.mine(&req, 1000).await.unwrap_err();
        assert!(matches!(err, MiningError::Send(_)));
        assert_eq!(service.history(&req.miner).await.unwrap().mine_count, "0");

        let mut conn = service.pool().acquire().await.unwrap();
        assert_eq!(service.bank().supply_of(&mut conn, "uzeth").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_ledger_write_is_fatal_and_rolls_back_the_reward() {
        let pool = memory_pool().await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_mining_records BEFORE INSERT ON kv_store
            WHEN NEW.key LIKE 'mining_record/%'
            BEGIN SELECT RAISE(ABORT, 'mining records are read-only'); END;
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        let service = MiningService::new(pool, StoreBank, Bech32Codec::new("zeth"), reward());
        let req = MineRequest { miner: miner() };

        let err = service.mine(&req, 1000).await.unwrap_err();
        match err {
            MiningError::Ledger(e) => assert!(e.is_fatal(), "{e}"),
            other => panic!("expected ledger failure, got {other}"),
        }

        let mut conn = service.pool().acquire().await.unwrap();
        let bank = service.bank();
        assert_eq!(bank.supply_of(&mut conn, "uzeth").await.unwrap(), 0);
        assert_eq!(bank.balance(&mut conn, &req.miner, "uzeth").await.unwrap(), 0);
        assert_eq!(
            bank.balance(&mut conn, &module_account(MINING_MODULE), "uzeth")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn uppercase_address_credits_the_same_account() {
        let pool = memory_pool().await;
        let service = MiningService::new(pool, StoreBank, Bech32Codec::new("zeth"), reward());
        let lower = miner();
        let upper = lower.to_ascii_uppercase();

        service.mine(&MineRequest { miner: upper.clone() }, 10).await.unwrap();
        service.mine(&MineRequest { miner: lower.clone() }, 20).await.unwrap();

        let mut conn = service.pool().acquire().await.unwrap();
        assert_eq!(
            service.bank().balance(&mut conn, &lower, "uzeth").await.unwrap(),
            200_000_000
        );
        assert_eq!(
            service.bank().balance(&mut conn, &upper, "uzeth").await.unwrap(),
            0
        );
        drop(conn);

        assert_eq!(service.history(&upper).await.unwrap().mine_count, "1");
        assert_eq!(service.history(&lower).await.unwrap().mine_count, "1");
    }

    #[tokio::test]
    async fn validate_returns_canonical_account() {
        let pool = memory_pool().await;
        let service = MiningService::new(pool, StoreBank, Bech32Codec::new("zeth"), reward());
        let upper = MineRequest {
            miner: miner().to_ascii_uppercase(),
        };
        assert_eq!(service.validate(&upper).unwrap(), miner());
        assert!(matches!(
            service.validate(&MineRequest { miner: " ".into() }),
            Err(MiningError::InvalidArgument(_))
        ));
    }

    fn temp_db_url(tag: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "zeth_mining_{}_{}_{}.sqlite",
            tag,
            std::process::id(),
            nanos
        ));
        let _ = std::fs::File::create(&path);
        format!("sqlite://{}", path.to_string_lossy())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mines_all_succeed() {
        let pool = init_pool(&temp_db_url("concurrent")).await.unwrap();
        let service = Arc::new(MiningService::new(
            pool,
            StoreBank,
            Bech32Codec::new("zeth"),
            reward(),
        ));
        let miner_a = encode_address("zeth", &[0xa; 20]).unwrap();
        let miner_b = encode_address("zeth", &[0xb; 20]).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let service = Arc::clone(&service);
                let miner = if i % 2 == 0 { miner_a.clone() } else { miner_b.clone() };
                tokio::spawn(async move { service.mine(&MineRequest { miner }, 1000 + i).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(service.history(&miner_a).await.unwrap().mine_count, "8");
        assert_eq!(service.history(&miner_b).await.unwrap().mine_count, "8");
        let mut conn = service.pool().acquire().await.unwrap();
        assert_eq!(
            service.bank().supply_of(&mut conn, "uzeth").await.unwrap(),
            16 * 100_000_000
        );
    }

    #[tokio::test]
    async fn history_requires_an_address() {
        let pool = memory_pool().await;
        let service = MiningService::new(pool, StoreBank, Bech32Codec::new("zeth"), reward());
        assert!(matches!(
            service.history(" ").await,
            Err(MiningError::InvalidArgument(_))
        ));
    }
}
