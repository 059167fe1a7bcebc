//! REST API handlers for mstpd
//!
//! Exposes one node's RPC surface with axum. The router is served before
//! the node exists; until [`AppState::install`] is called every endpoint
//! answers 503.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sonic_mstp::{
    Bpdu, BridgeId, GlobalPortStates, MstpError, MstpNode, NodeStatus, TransferHop, TransferId,
    VlanId,
};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Body of `POST /bpdu`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpduRequest {
    pub vlan_id: VlanId,
    /// Sending neighbor, which is also the receiving port
    pub from: BridgeId,
    pub bpdu: Bpdu,
}

/// Body of `POST /initiate-transfer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiateTransferRequest {
    pub dst: BridgeId,
    pub vlan_id: VlanId,
    pub file_size_mb: f64,
    /// Port roles of every node, as aggregated by the status poller
    #[serde(default)]
    pub global_port_states: GlobalPortStates,
    #[serde(default)]
    pub payload: String,
}

/// Body of `POST /complete-transfer` and `POST /fail-transfer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIdRequest {
    pub transfer_id: TransferId,
}

/// Acknowledgement returned by every POST endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<TransferId>,
}

impl StatusResponse {
    fn new(status: &str) -> Json<Self> {
        Json(Self {
            status: status.to_string(),
            transfer_id: None,
        })
    }
}

/// Error answer: `{"error": message}` with an HTTP status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_ready() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "node not initialized")
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<MstpError> for ApiError {
    fn from(e: MstpError) -> Self {
        match e {
            e if e.is_contract_violation() => Self::bad_request(e.to_string()),
            e => Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Shared handler state: the node once it is constructed
#[derive(Debug, Clone, Default)]
pub struct AppState {
    node: Arc<OnceLock<Arc<MstpNode>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `node` visible to the handlers. Returns false if a node was
    /// already installed.
    pub fn install(&self, node: Arc<MstpNode>) -> bool {
        self.node.set(node).is_ok()
    }

    fn node(&self) -> Result<&Arc<MstpNode>, ApiError> {
        self.node.get().ok_or_else(ApiError::not_ready)
    }
}

fn check_file_size(file_size_mb: f64) -> Result<(), ApiError> {
    if file_size_mb.is_finite() && file_size_mb >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "file_size_mb must be a non-negative number, got {}",
            file_size_mb
        )))
    }
}

/// `POST /bpdu`
pub async fn submit_bpdu(
    State(state): State<AppState>,
    Json(request): Json<BpduRequest>,
) -> ApiResult<StatusResponse> {
    let node = state.node()?;
    node.on_bpdu(request.vlan_id, &request.from, request.bpdu)
        .map_err(|e| {
            error!(from = %request.from, vlan = request.vlan_id, error = %e, "Rejected BPDU");
            ApiError::from(e)
        })?;
    Ok(StatusResponse::new("received"))
}

/// `POST /initiate-transfer`
pub async fn initiate_transfer(
    State(state): State<AppState>,
    Json(request): Json<InitiateTransferRequest>,
) -> ApiResult<StatusResponse> {
    let node = state.node()?;
    check_file_size(request.file_size_mb)?;

    let transfer_id = node.initiate_transfer(
        request.dst,
        request.payload,
        request.file_size_mb,
        request.vlan_id,
        &request.global_port_states,
    );
    info!(transfer_id = %transfer_id, "Transfer initiated via REST API");

    Ok(Json(StatusResponse {
        status: "transfer initiated".to_string(),
        transfer_id: Some(transfer_id),
    }))
}

/// `POST /transfer`
pub async fn relay_hop(
    State(state): State<AppState>,
    Json(hop): Json<TransferHop>,
) -> ApiResult<StatusResponse> {
    let node = state.node()?;
    check_file_size(hop.file_size_mb)?;
    debug!(transfer_id = %hop.transfer_id, hops = hop.hops, "Hop received");
    node.on_transfer_hop(hop);
    Ok(StatusResponse::new("hop received"))
}

/// `POST /complete-transfer`
pub async fn complete_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferIdRequest>,
) -> ApiResult<StatusResponse> {
    state.node()?.complete_transfer(request.transfer_id);
    Ok(StatusResponse::new("completion noted"))
}

/// `POST /fail-transfer`
pub async fn fail_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferIdRequest>,
) -> ApiResult<StatusResponse> {
    state.node()?.fail_transfer(request.transfer_id);
    Ok(StatusResponse::new("failure noted"))
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> ApiResult<NodeStatus> {
    Ok(Json(state.node()?.status()))
}

/// Builds the RPC router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/bpdu", post(submit_bpdu))
        .route("/initiate-transfer", post(initiate_transfer))
        .route("/transfer", post(relay_hop))
        .route("/complete-transfer", post(complete_transfer))
        .route("/fail-transfer", post(fail_transfer))
        .route("/status", get(status))
        .with_state(state)
}

/// Serves the RPC surface on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Serving MSTP RPC on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
