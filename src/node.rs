//! Read-only client for the CometBFT RPC endpoints the explorer consumes.
//!
//! `/block` says what was submitted at a height, `/block_results` says what
//! happened when it executed. The two are fetched independently and only
//! correlated by position later on.

use std::fmt;
use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeQuery {
    Block,
    BlockResults,
    Status,
    Validators,
}

impl NodeQuery {
    fn path(self) -> &'static str {
        match self {
            NodeQuery::Block => "block",
            NodeQuery::BlockResults => "block_results",
            NodeQuery::Status => "status",
            NodeQuery::Validators => "validators",
        }
    }
}

impl fmt::Display for NodeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("failed to query {query}: {source}")]
    Transport {
        query: NodeQuery,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode {query} response: {reason}")]
    Decode { query: NodeQuery, reason: String },
    #[error("node rejected {query} query: {message}")]
    Rpc { query: NodeQuery, message: String },
}

impl FetchError {
    pub fn query(&self) -> NodeQuery {
        match self {
            FetchError::Transport { query, .. }
            | FetchError::Decode { query, .. }
            | FetchError::Rpc { query, .. } => *query,
        }
    }

    fn decode(query: NodeQuery, reason: impl fmt::Display) -> Self {
        FetchError::Decode {
            query,
            reason: reason.to_string(),
        }
    }
}

/// A block as submitted: header fields plus raw transaction bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub hash: String,
    pub height: u64,
    pub time: String,
    /// Lowercase hex.
    pub proposer: String,
    pub last_block_hash: Option<String>,
    pub txs: Vec<Vec<u8>>,
}

/// Execution outcome of one transaction, index-aligned with [`RawBlock::txs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TxExecResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub log: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub gas_wanted: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub gas_used: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub latest_block_height: u64,
    /// Unix seconds of the latest block; the chain's notion of "now".
    pub latest_block_time: i64,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    block_id: WireBlockId,
    block: WireBlock,
}

#[derive(Debug, Deserialize)]
struct WireBlockId {
    #[serde(default)]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    header: WireHeader,
    data: WireBlockData,
}

#[derive(Debug, Deserialize)]
struct WireHeader {
    height: String,
    time: String,
    #[serde(default)]
    proposer_address: String,
    #[serde(default)]
    last_block_id: Option<WireBlockId>,
}

#[derive(Debug, Deserialize)]
struct WireBlockData {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct BlockResultsResponse {
    #[serde(default)]
    txs_results: Option<Vec<TxExecResult>>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    sync_info: WireSyncInfo,
}

#[derive(Debug, Deserialize)]
struct WireSyncInfo {
    latest_block_height: String,
    latest_block_time: String,
}

#[derive(Debug, Deserialize)]
struct ValidatorsResponse {
    #[serde(deserialize_with = "string_or_number")]
    total: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
        Signed(i64),
        Null(Option<()>),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
        Raw::Signed(n) => n.to_string(),
        Raw::Null(_) => String::new(),
    })
}

#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl NodeClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;
        let url = Url::parse(rpc_url).context("invalid NODE_RPC_URL")?;
        Ok(Self {
            http,
            base_url: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch_block(&self, height: u64) -> Result<RawBlock, FetchError> {
        let body = self.get(NodeQuery::Block, Some(height)).await?;
        parse_block(&body)
    }

    pub async fn fetch_block_results(&self, height: u64) -> Result<Vec<TxExecResult>, FetchError> {
        let body = self.get(NodeQuery::BlockResults, Some(height)).await?;
        parse_block_results(&body)
    }

    /// Both payloads for one height, requested concurrently. The first
    /// failure wins and names its request.
    pub async fn fetch_pair(&self, height: u64) -> Result<(RawBlock, Vec<TxExecResult>), FetchError> {
        tokio::try_join!(self.fetch_block(height), self.fetch_block_results(height))
    }

    pub async fn status(&self) -> Result<NodeStatus, FetchError> {
        let body = self.get(NodeQuery::Status, None).await?;
        parse_status(&body)
    }

    pub async fn validator_count(&self) -> Result<u64, FetchError> {
        let body = self.get(NodeQuery::Validators, None).await?;
        let res: ValidatorsResponse = unwrap_envelope(NodeQuery::Validators, &body)?;
        res.total
            .parse()
            .map_err(|_| FetchError::decode(NodeQuery::Validators, format!("bad total {:?}", res.total)))
    }

    async fn get(&self, query: NodeQuery, height: Option<u64>) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/{}", self.base_url, query.path());
        debug!("GET {} height={:?}", url, height);

        let mut req = self.http.get(&url);
        if let Some(h) = height {
            req = req.query(&[("height", h)]);
        }
        let transport = |source: reqwest::Error| FetchError::Transport { query, source };
        let resp = req.send().await.map_err(transport)?;
        // Error statuses still carry a JSON-RPC error body worth surfacing.
        if !resp.status().is_success() {
            debug!("{} answered HTTP {}", url, resp.status());
        }
        let body = resp.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

fn unwrap_envelope<T: DeserializeOwned>(query: NodeQuery, body: &[u8]) -> Result<T, FetchError> {
    let envelope: RpcEnvelope<T> =
        serde_json::from_slice(body).map_err(|e| FetchError::decode(query, e))?;
    if let Some(err) = envelope.error {
        let message = match err.data {
            Some(data) if !data.is_empty() => format!("{}: {}", err.message, data),
            _ => err.message,
        };
        return Err(FetchError::Rpc { query, message });
    }
    envelope
        .result
        .ok_or_else(|| FetchError::decode(query, "response has no result"))
}

fn parse_block(body: &[u8]) -> Result<RawBlock, FetchError> {
    let q = NodeQuery::Block;
    let res: BlockResponse = unwrap_envelope(q, body)?;
    let header = res.block.header;

    let height = header
        .height
        .parse()
        .map_err(|_| FetchError::decode(q, format!("bad height {:?}", header.height)))?;
    let proposer = normalize_proposer(&header.proposer_address)
        .ok_or_else(|| FetchError::decode(q, format!("bad proposer {:?}", header.proposer_address)))?;
    let txs = res
        .block
        .data
        .txs
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, tx)| {
            BASE64
                .decode(tx)
                .map_err(|e| FetchError::decode(q, format!("tx {} is not base64: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawBlock {
        hash: res.block_id.hash,
        height,
        time: header.time,
        proposer,
        last_block_hash: header
            .last_block_id
            .map(|id| id.hash)
            .filter(|hash| !hash.is_empty()),
        txs,
    })
}

fn parse_block_results(body: &[u8]) -> Result<Vec<TxExecResult>, FetchError> {
    let res: BlockResultsResponse = unwrap_envelope(NodeQuery::BlockResults, body)?;
    Ok(res.txs_results.unwrap_or_default())
}

fn parse_status(body: &[u8]) -> Result<NodeStatus, FetchError> {
    let q = NodeQuery::Status;
    let res: StatusResponse = unwrap_envelope(q, body)?;
    let info = res.sync_info;
    let latest_block_height = info
        .latest_block_height
        .parse()
        .map_err(|_| FetchError::decode(q, format!("bad height {:?}", info.latest_block_height)))?;
    let latest_block_time = chrono::DateTime::parse_from_rfc3339(&info.latest_block_time)
        .map_err(|e| FetchError::decode(q, format!("bad time {:?}: {}", info.latest_block_time, e)))?
        .timestamp();
    Ok(NodeStatus {
        latest_block_height,
        latest_block_time,
    })
}

/// CometBFT renders the proposer as uppercase hex; older gateways use base64.
fn normalize_proposer(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return Some(String::new());
    }
    if let Ok(bytes) = hex::decode(raw) {
        return Some(hex::encode(bytes));
    }
    BASE64.decode(raw).ok().map(hex::encode)
}
