use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::address::Bech32Codec;
use crate::bank::{BankError, BankKeeper, StoreBank};
use crate::explorer::Explorer;
use crate::mining::{MiningError, MiningService};
use crate::models::{BlockSummary, ChainStats, LatestBlocks, MineRequest, MineResponse, MiningHistory};
use crate::node::FetchError;
use crate::service_stats::{ServiceSnapshot, SERVICE_STATS};
use crate::storage::{self, StoreError};

pub type Mining = MiningService<StoreBank, Bech32Codec>;

#[derive(Clone)]
pub struct AppState {
    pub explorer: Explorer,
    pub mining: Arc<Mining>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Mining(MiningError),
    Fetch(FetchError),
    Bank(BankError),
    Store(StoreError),
}

impl From<MiningError> for ApiError {
    fn from(e: MiningError) -> Self {
        ApiError::Mining(e)
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        ApiError::Fetch(e)
    }
}

impl From<BankError> for ApiError {
    fn from(e: BankError) -> Self {
        ApiError::Bank(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Mining(MiningError::InvalidArgument(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_argument")
            }
            ApiError::Mining(MiningError::InvalidAddress(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_address")
            }
            ApiError::Mining(MiningError::Mint(_) | MiningError::Send(_)) | ApiError::Bank(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "bank")
            }
            ApiError::Mining(MiningError::Ledger(_) | MiningError::Store(_)) | ApiError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "store")
            }
            ApiError::Fetch(_) => (StatusCode::BAD_GATEWAY, "node"),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Mining(e) => e.to_string(),
            ApiError::Fetch(e) => e.to_string(),
            ApiError::Bank(e) => e.to_string(),
            ApiError::Store(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, category) = self.classify();
        let message = self.message();
        if status.is_server_error() {
            error!("{} error: {}", category, message);
        }
        (
            status,
            Json(ErrorBody {
                error: category,
                message,
            }),
        )
            .into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Deserialize)]
struct BlockInfoParams {
    height: Option<u64>,
}

async fn block_info(
    State(state): State<AppState>,
    Query(params): Query<BlockInfoParams>,
) -> Result<Json<BlockSummary>, ApiError> {
    let summary = state.explorer.block_info(params.height.unwrap_or(0)).await?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
struct LatestBlocksParams {
    limit: Option<u32>,
}

async fn latest_blocks(
    State(state): State<AppState>,
    Query(params): Query<LatestBlocksParams>,
) -> Result<Json<LatestBlocks>, ApiError> {
    let blocks = state.explorer.latest_blocks(params.limit.unwrap_or(0)).await?;
    Ok(Json(blocks))
}

async fn chain_stats(State(state): State<AppState>) -> Result<Json<ChainStats>, ApiError> {
    let minted = {
        let mut conn = storage::acquire(state.mining.pool()).await?;
        state
            .mining
            .bank()
            .supply_of(&mut conn, &state.mining.reward().denom)
            .await?
    };
    let stats = state.explorer.chain_stats(minted).await?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
struct MiningHistoryParams {
    #[serde(default)]
    address: String,
}

async fn mining_history(
    State(state): State<AppState>,
    Query(params): Query<MiningHistoryParams>,
) -> Result<Json<MiningHistory>, ApiError> {
    let history = state.mining.history(&params.address).await?;
    Ok(Json(history))
}

async fn mine(
    State(state): State<AppState>,
    Json(req): Json<MineRequest>,
) -> Result<Json<MineResponse>, ApiError> {
    state.mining.validate(&req)?;
    let block_time = state.explorer.node().status().await?.latest_block_time;
    let res = state.mining.mine(&req, block_time).await?;
    Ok(Json(res))
}

async fn service_stats() -> Json<ServiceSnapshot> {
    Json(SERVICE_STATS.snapshot())
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/zethchain/explorer/v1/block_info", get(block_info))
        .route("/zethchain/explorer/v1/latest_blocks", get(latest_blocks))
        .route("/zethchain/explorer/v1/chain_stats", get(chain_stats))
        .route("/zethchain/mining/v1/mining_history", get(mining_history))
        .route("/zethchain/mining/v1/mine", post(mine))
        .route("/stats/service", get(service_stats))
        .with_state(state)
}

pub async fn run_http_server(addr: &str, state: AppState) -> Result<()> {
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
