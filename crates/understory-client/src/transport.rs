//! Outbound half of the backend channel

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::protocol::{OutboundRequest, ProtocolError};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The backend side of the channel is gone.
    #[error("Backend channel closed")]
    Closed,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One-way sender of requests to the analysis backend.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<(), TransportError>;
}

/// Transport that queues requests on an mpsc channel. The receiving end is
/// drained by the WebSocket writer, or inspected directly in tests.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundRequest>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, request: OutboundRequest) -> Result<(), TransportError> {
        tracing::debug!("Sending request: {:?}", request);
        self.tx.send(request).map_err(|_| TransportError::Closed)
    }
}

/// Transport that records every request, for assertions.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self, request: &OutboundRequest) -> usize {
        self.sent().iter().filter(|r| *r == request).count()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: OutboundRequest) -> Result<(), TransportError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(request);
        }
        Ok(())
    }
}
