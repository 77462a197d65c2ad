use std::env;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::models::Coin;
use crate::reconstruct::TxDefaults;

#[derive(Debug, Clone)]
pub struct Config {
    pub node_rpc_url: String,
    pub database_url: String,
    pub http_bind_addr: String,
    pub mining_reward: u64,
    pub reward_denom: String,
    pub address_prefix: String,
    pub genesis_supply: u64,
    pub tx_gas_price: String,
    pub node_timeout: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_rpc_url =
            env::var("NODE_RPC_URL").unwrap_or_else(|_| "http://localhost:26657".to_string());
        if Url::parse(&node_rpc_url).is_err() {
            return Err(ConfigError::Invalid {
                var: "NODE_RPC_URL",
                value: node_rpc_url,
            });
        }

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/zeth.db".to_string());
        let http_bind_addr = env::var("HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let mining_reward = parse_var("MINING_REWARD", 100_000_000u64)?;
        if mining_reward == 0 {
            return Err(ConfigError::Invalid {
                var: "MINING_REWARD",
                value: "0".to_string(),
            });
        }
        let reward_denom = non_empty_var("REWARD_DENOM", "uzeth")?;
        let address_prefix = non_empty_var("ADDRESS_PREFIX", "zeth")?;
        let genesis_supply = parse_var("GENESIS_SUPPLY", 21_000_000_000u64)?;
        let tx_gas_price = non_empty_var("TX_GAS_PRICE", "0.025")?;
        let node_timeout = Duration::from_secs(parse_var("NODE_TIMEOUT_SECS", 10u64)?);

        Ok(Self {
            node_rpc_url,
            database_url,
            http_bind_addr,
            mining_reward,
            reward_denom,
            address_prefix,
            genesis_supply,
            tx_gas_price,
            node_timeout,
        })
    }

    pub fn reward_coin(&self) -> Coin {
        Coin::new(self.mining_reward, self.reward_denom.clone())
    }

    pub fn tx_defaults(&self) -> TxDefaults {
        TxDefaults {
            denom: self.reward_denom.clone(),
            gas_price: self.tx_gas_price.clone(),
        }
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => Ok(value),
            Err(_) => Err(ConfigError::Invalid { var, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

fn non_empty_var(var: &'static str, default: &str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(raw) if raw.trim().is_empty() => Err(ConfigError::Invalid { var, value: raw }),
        Ok(raw) => Ok(raw.trim().to_string()),
        Err(_) => Ok(default.to_string()),
    }
}
