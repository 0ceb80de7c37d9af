//! REST API handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use understory_client::ViewStatus;
use understory_core::{ContextKind, GraphModel, GraphNode, ImpactResult, ModuleInfo};

use crate::ServerState;

/// Summary of the view for status bars.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub status: ViewStatus,
    pub file_count: u32,
    pub module_count: u32,
    pub entrypoint_count: u32,
    pub edge_count: u32,
    pub token_estimate: u64,
    pub last_indexed_at: Option<String>,
    pub refreshing: bool,
    pub sequence: u64,
    pub context_keys: Vec<String>,
    pub viewers: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct TargetQuery {
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct AddContextBody {
    pub kind: ContextKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AddContextResponse {
    pub key: Option<String>,
}

/// The assembled graph model.
pub async fn get_graph(State(state): State<Arc<ServerState>>) -> Json<GraphModel> {
    Json(state.view.model().await)
}

pub async fn get_state(State(state): State<Arc<ServerState>>) -> Json<StateResponse> {
    let view = &state.view;
    let digest = view.digest().await.unwrap_or_default();
    Json(StateResponse {
        status: view.status().await,
        file_count: digest.file_count,
        module_count: digest.module_count,
        entrypoint_count: digest.entrypoint_count,
        edge_count: digest.edge_count,
        token_estimate: digest.token_estimate,
        last_indexed_at: digest.last_indexed_at.map(|t| t.to_rfc3339()),
        refreshing: view.in_flight().is_refreshing(),
        sequence: view.diff_sequence().await,
        context_keys: view.context_keys().await,
        viewers: state.viewer_count(),
    })
}

/// One node per indexed file, without links.
pub async fn get_files(State(state): State<Arc<ServerState>>) -> Json<Vec<GraphNode>> {
    Json(state.view.file_nodes().await)
}

pub async fn get_impact(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<ImpactResult>, StatusCode> {
    state
        .view
        .impact(&query.target)
        .await
        .map(Json)
        .ok_or(StatusCode::GATEWAY_TIMEOUT)
}

/// Module detail from the backend. If it does not answer in time, fall
/// back to what the local edges and issues know.
pub async fn get_module(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<ModuleInfo>, StatusCode> {
    if let Some(info) = state.view.module_detail(&query.target).await {
        return Ok(Json(info));
    }
    tracing::debug!("No module detail from backend for {}, using local edges", query.target);
    state
        .view
        .local_module_info(&query.target)
        .await
        .map(Json)
        .ok_or(StatusCode::GATEWAY_TIMEOUT)
}

pub async fn add_context(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<AddContextBody>,
) -> Result<Json<AddContextResponse>, StatusCode> {
    match state.view.add_to_context(body.kind, body.payload).await {
        Ok(key) => Ok(Json(AddContextResponse { key })),
        Err(e) => {
            tracing::warn!("Failed to add to context: {}", e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

/// Request a refresh, or a retry when the view is in the error state.
pub async fn refresh(State(state): State<Arc<ServerState>>) -> StatusCode {
    let result = if matches!(state.view.status().await, ViewStatus::Error { .. }) {
        state.view.retry().await
    } else {
        state.view.request_refresh().await
    };
    match result {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::warn!("Failed to request refresh: {}", e);
            StatusCode::BAD_GATEWAY
        }
    }
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
