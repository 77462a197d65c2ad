use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "zeth-mining-explorer", version, about = "Mining reward ledger and block explorer for zethchain")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Override bind address, e.g. 0.0.0.0:8080
        #[arg(long)]
        addr: Option<String>,
    },
    /// Issue one mining reward to an address
    Mine {
        #[arg(long)]
        miner: String,
        /// Unix time to record; defaults to the node's latest block time
        #[arg(long)]
        block_time: Option<i64>,
    },
    /// Print the reconstructed summary of a block (0 = latest)
    BlockInfo {
        #[arg(long, default_value_t = 0)]
        height: u64,
    },
    /// Print the mining history of an address
    MiningHistory {
        #[arg(long)]
        address: String,
    },
    /// List the most recent block heights
    LatestBlocks {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}
