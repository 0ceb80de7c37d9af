//! WebSocket handling for live model updates

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use understory_core::{GraphModel, ModelDiff, Selection};

use crate::ServerState;

/// Messages pushed to the renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Sent once on connect.
    FullModel { model: GraphModel, sequence: u64 },
    ModelDiff { diff: ModelDiff },
    Selection { selection: Option<Selection> },
    Pong,
    Error { message: String },
}

/// Messages the renderer sends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Select { node_id: String },
    #[serde(rename_all = "camelCase")]
    Hover { node_id: Option<String> },
    ClearSelection,
    Ping,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    info!("Renderer connected");
    state.viewer_connected();

    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the snapshot so no diff falls between the two.
    let mut diffs = state.view.subscribe_diffs();

    let (snapshot_sequence, model) = state.view.snapshot().await;
    let snapshot = ServerMessage::FullModel {
        sequence: snapshot_sequence,
        model,
    };
    if send_json(&mut sender, &snapshot).await.is_err() {
        warn!("Failed to send initial model to renderer");
        state.viewer_disconnected();
        return;
    }

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        if let Some(reply) = handle_client_message(client_msg, &recv_state).await {
                            if reply_tx.send(reply).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse renderer message: {}", e);
                        let _ = reply_tx.send(ServerMessage::Error {
                            message: format!("Invalid message: {e}"),
                        });
                    }
                },
                Message::Close(_) => {
                    debug!("Renderer closed the socket");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                diff = diffs.recv() => match diff {
                    // Already part of the snapshot.
                    Ok(diff) if diff.sequence <= snapshot_sequence => continue,
                    Ok(diff) => ServerMessage::ModelDiff { diff },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Renderer lagged behind by {} diffs", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };
            if send_json(&mut sender, &outgoing).await.is_err() {
                debug!("Failed to send message to renderer");
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    state.viewer_disconnected();
    info!("Renderer disconnected");
}

async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|e| {
        warn!("Failed to serialize renderer message: {}", e);
    })?;
    sender.send(Message::Text(json)).await.map_err(|_| ())
}

/// Apply one renderer message to the view; returns the reply, if any.
async fn handle_client_message(msg: ClientMessage, state: &ServerState) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Select { node_id } => {
            debug!("Renderer selected {}", node_id);
            let selection = state.view.select(&node_id).await;
            Some(ServerMessage::Selection {
                selection: Some(selection),
            })
        }
        ClientMessage::Hover { node_id } => {
            state.view.hover(node_id.as_deref()).await;
            None
        }
        ClientMessage::ClearSelection => {
            state.view.clear_selection().await;
            Some(ServerMessage::Selection { selection: None })
        }
        ClientMessage::Ping => Some(ServerMessage::Pong),
    }
}
