//! HTTP surface served on a node's replication port (base port + 1)
//!
//! Peers use `GET /chain-snapshot` and `POST /inbound-block`. Everything under
//! `/api` is the client interface for minting, moving and inspecting items.

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::node::Node;
use crate::sync::{BlockTransport, Commit};

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub struct ApiError(ChainError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ChainError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ChainError::ItemNotFound(_) => StatusCode::NOT_FOUND,
            ChainError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            ChainError::AlreadyInitialized(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct MintRequest {
    pub item_name: String,
    pub owner: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub item_name: String,
    pub origin_user: String,
    pub destination_user: String,
    /// Looked up from the origin user's holdings by name when absent.
    #[serde(default)]
    pub item_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConsumeRequest {
    pub item_name: String,
    pub owner: String,
    #[serde(default)]
    pub item_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CombineRequest {
    pub input_item_names: Vec<String>,
    pub input_item_ids: Vec<String>,
    pub output_item_name: String,
    pub owner: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SplitRequest {
    pub source_item_name: String,
    pub source_item_id: String,
    pub output_item_names: Vec<String>,
    pub owner: String,
    pub destination_users: Vec<String>,
}

#[derive(Serialize)]
pub struct CommitResponse {
    pub block: Block,
    /// Peers the block is being sent to; delivery is not awaited.
    pub peers_notified: usize,
}

impl From<Commit> for CommitResponse {
    fn from(commit: Commit) -> Self {
        CommitResponse {
            peers_notified: commit.broadcast.len(),
            block: commit.block,
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status, duration and node state for every request.
async fn logging_middleware<T: BlockTransport>(
    State(node): State<Arc<Node<T>>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let node_state = node.state().await;
    tracing::debug!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        node_state = ?node_state,
        "api.request"
    );

    response
}

// ============================================================================
// Router
// ============================================================================

pub fn build_replication_router<T: BlockTransport>(node: Arc<Node<T>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    let client_routes = Router::new()
        .route("/health", get(health_check::<T>))
        .route("/chain", get(get_chain_info::<T>))
        .route("/chain/validate", get(validate_chain::<T>))
        .route("/items/:item_id/history", get(get_item_history::<T>))
        .route("/owners/:user/items", get(get_owner_items::<T>))
        .route("/network/peers", get(get_peers::<T>))
        .route("/items/mint", post(mint_item::<T>))
        .route("/items/transfer", post(transfer_item::<T>))
        .route("/items/consume", post(consume_item::<T>))
        .route("/items/combine", post(combine_items::<T>))
        .route("/items/split", post(split_item::<T>))
        .layer(cors);

    Router::new()
        .route("/chain-snapshot", get(chain_snapshot::<T>))
        .route("/inbound-block", post(inbound_block::<T>))
        .nest("/api", client_routes)
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware::<T>))
        .with_state(node)
}

// ============================================================================
// Replication Handlers
// ============================================================================

async fn chain_snapshot<T: BlockTransport>(State(node): State<Arc<Node<T>>>) -> Json<Vec<Block>> {
    Json(node.replicator.snapshot().await)
}

/// Always 202 with an empty body: the sender learns nothing about acceptance.
async fn inbound_block<T: BlockTransport>(
    State(node): State<Arc<Node<T>>>,
    body: Bytes,
) -> StatusCode {
    node.replicator.on_inbound_payload(&body).await;
    StatusCode::ACCEPTED
}

// ============================================================================
// Client Handlers
// ============================================================================

async fn health_check<T: BlockTransport>(State(node): State<Arc<Node<T>>>) -> impl IntoResponse {
    let state = node.state().await;
    let (status, label) = if state.is_operational() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "node_state": state,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

async fn get_chain_info<T: BlockTransport>(State(node): State<Arc<Node<T>>>) -> impl IntoResponse {
    Json(node.chain_info().await)
}

async fn validate_chain<T: BlockTransport>(State(node): State<Arc<Node<T>>>) -> impl IntoResponse {
    let result = node.validate_chain().await;
    Json(serde_json::json!({
        "valid": result.is_ok(),
        "error": result.err().map(|e| e.to_string()),
    }))
}

async fn get_item_history<T: BlockTransport>(
    State(node): State<Arc<Node<T>>>,
    Path(item_id): Path<String>,
) -> impl IntoResponse {
    let transactions = node.item_history(&item_id).await;
    Json(serde_json::json!({
        "item_id": item_id,
        "count": transactions.len(),
        "transactions": transactions,
    }))
}

async fn get_owner_items<T: BlockTransport>(
    State(node): State<Arc<Node<T>>>,
    Path(user): Path<String>,
) -> impl IntoResponse {
    let items = node.items_of_owner(&user).await;
    Json(serde_json::json!({
        "owner": user,
        "count": items.len(),
        "items": items,
    }))
}

async fn get_peers<T: BlockTransport>(State(node): State<Arc<Node<T>>>) -> impl IntoResponse {
    let book = node.replicator.peers();
    let peers = book.peers();
    Json(serde_json::json!({
        "me": book.me(),
        "first": book.is_first(),
        "count": peers.len(),
        "peers": peers,
    }))
}

async fn mint_item<T: BlockTransport>(
    State(node): State<Arc<Node<T>>>,
    Json(req): Json<MintRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let commit = node.mint(&req.item_name, &req.owner).await?;
    Ok(Json(commit.into()))
}

async fn transfer_item<T: BlockTransport>(
    State(node): State<Arc<Node<T>>>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let commit = node
        .transfer(
            &req.item_name,
            &req.origin_user,
            &req.destination_user,
            req.item_id.as_deref(),
        )
        .await?;
    Ok(Json(commit.into()))
}

async fn consume_item<T: BlockTransport>(
    State(node): State<Arc<Node<T>>>,
    Json(req): Json<ConsumeRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let commit = node
        .consume(&req.item_name, &req.owner, req.item_id.as_deref())
        .await?;
    Ok(Json(commit.into()))
}

async fn combine_items<T: BlockTransport>(
    State(node): State<Arc<Node<T>>>,
    Json(req): Json<CombineRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let commit = node
        .combine(
            &req.input_item_names,
            &req.input_item_ids,
            &req.output_item_name,
            &req.owner,
        )
        .await?;
    Ok(Json(commit.into()))
}

async fn split_item<T: BlockTransport>(
    State(node): State<Arc<Node<T>>>,
    Json(req): Json<SplitRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let commit = node
        .split(
            &req.source_item_name,
            &req.source_item_id,
            &req.output_item_names,
            &req.owner,
            &req.destination_users,
        )
        .await?;
    Ok(Json(commit.into()))
}

