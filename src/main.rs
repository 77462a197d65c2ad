mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use zeth_mining_explorer::address::Bech32Codec;
use zeth_mining_explorer::api::{self, AppState};
use zeth_mining_explorer::bank::StoreBank;
use zeth_mining_explorer::config::Config;
use zeth_mining_explorer::explorer::Explorer;
use zeth_mining_explorer::mining::MiningService;
use zeth_mining_explorer::models::MineRequest;
use zeth_mining_explorer::node::NodeClient;
use zeth_mining_explorer::storage;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let state = build_state(&config).await?;

    match cli.command {
        Commands::Serve { addr } => {
            let bind = addr.unwrap_or_else(|| config.http_bind_addr.clone());
            api::run_http_server(&bind, state).await?;
        }
        Commands::Mine { miner, block_time } => {
            let req = MineRequest { miner };
            state.mining.validate(&req)?;
            let block_time = match block_time {
                Some(t) => t,
                None => state.explorer.node().status().await?.latest_block_time,
            };
            let res = state.mining.mine(&req, block_time).await?;
            print_json(&res)?;
        }
        Commands::BlockInfo { height } => {
            let summary = state.explorer.block_info(height).await?;
            print_json(&summary)?;
        }
        Commands::MiningHistory { address } => {
            let history = state.mining.history(&address).await?;
            print_json(&history)?;
        }
        Commands::LatestBlocks { limit } => {
            let blocks = state.explorer.latest_blocks(limit).await?;
            print_json(&blocks)?;
        }
    }

    Ok(())
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let pool = storage::init_pool(&config.database_url)
        .await
        .with_context(|| format!("failed to open store at {}", config.database_url))?;
    let node = NodeClient::new(&config.node_rpc_url, config.node_timeout)?;
    let explorer = Explorer::new(node, config.tx_defaults(), config.genesis_supply);
    let mining = MiningService::new(
        pool,
        StoreBank,
        Bech32Codec::new(config.address_prefix.clone()),
        config.reward_coin(),
    );
    Ok(AppState {
        explorer,
        mining: Arc::new(mining),
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
