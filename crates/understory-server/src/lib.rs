//! HTTP + WebSocket server exposing the graph view to a renderer

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use understory_client::{set_visibility, GraphView, Visibility};

pub mod handlers;
pub mod router;
pub mod websocket;

/// State shared by every handler.
pub struct ServerState {
    pub view: Arc<GraphView>,
    visibility: watch::Sender<Visibility>,
    viewers: AtomicUsize,
}

impl ServerState {
    pub fn new(view: Arc<GraphView>, visibility: watch::Sender<Visibility>) -> Self {
        Self {
            view,
            visibility,
            viewers: AtomicUsize::new(0),
        }
    }

    /// A renderer attached. The first one makes the view visible.
    pub fn viewer_connected(&self) {
        if self.viewers.fetch_add(1, Ordering::SeqCst) == 0 {
            set_visibility(&self.visibility, Visibility::Visible);
        }
    }

    /// A renderer detached. The last one hides the view.
    pub fn viewer_disconnected(&self) {
        if self.viewers.fetch_sub(1, Ordering::SeqCst) == 1 {
            set_visibility(&self.visibility, Visibility::Hidden);
        }
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.load(Ordering::SeqCst)
    }

    pub fn visibility(&self) -> Visibility {
        *self.visibility.borrow()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub struct UnderstoryServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl UnderstoryServer {
    pub fn new(state: ServerState, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(state),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind and serve until the listener fails.
    pub async fn start(self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.config.host, self.config.port))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Serving graph view on http://{}", addr);

        let app = router::create_router(self.state);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
