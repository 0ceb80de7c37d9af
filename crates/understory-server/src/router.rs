//! Axum router setup for the renderer-facing server

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{
    handlers::{add_context, get_files, get_graph, get_impact, get_module, get_state, health_check, refresh},
    websocket::ws_handler,
    ServerState,
};

pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Model snapshot first, then diffs
        .route("/ws", get(ws_handler))
        .route("/api/graph", get(get_graph))
        .route("/api/state", get(get_state))
        .route("/api/files", get(get_files))
        .route("/api/impact", get(get_impact))
        .route("/api/module", get(get_module))
        .route("/api/context", post(add_context))
        .route("/api/refresh", post(refresh))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
