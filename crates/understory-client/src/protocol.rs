//! Message protocol between the view and the analysis backend

use serde::{Deserialize, Serialize};
use understory_core::{
    ContextItem, ContextKind, Diagnostics, Digest, FileIndexEntry, GraphEdge, Issue, ModuleInfo,
};

/// Events the backend pushes to the view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundEvent {
    DigestReady { digest: Digest },
    IssuesReady { issues: Vec<Issue> },
    EdgesReady { edges: Vec<GraphEdge> },
    FileIndexReady { files: Vec<FileIndexEntry> },
    DiagnosticsReady { diagnostics: Diagnostics },
    RefreshStarted,
    RefreshCompleted,
    Error { message: String },
    /// Authoritative list of items in the outbound analysis context.
    ContextSnapshot { items: Vec<ContextItem> },
    /// Correlated response to [`OutboundRequest::RequestImpact`].
    ImpactResult {
        target: String,
        result: understory_core::ImpactResult,
    },
    /// Correlated response to [`OutboundRequest::RequestModuleDetail`].
    ModuleDetail { path: String, info: ModuleInfo },
}

/// Discriminant of [`InboundEvent`], used to say which response a
/// correlated request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DigestReady,
    IssuesReady,
    EdgesReady,
    FileIndexReady,
    DiagnosticsReady,
    RefreshStarted,
    RefreshCompleted,
    Error,
    ContextSnapshot,
    ImpactResult,
    ModuleDetail,
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::DigestReady { .. } => EventKind::DigestReady,
            InboundEvent::IssuesReady { .. } => EventKind::IssuesReady,
            InboundEvent::EdgesReady { .. } => EventKind::EdgesReady,
            InboundEvent::FileIndexReady { .. } => EventKind::FileIndexReady,
            InboundEvent::DiagnosticsReady { .. } => EventKind::DiagnosticsReady,
            InboundEvent::RefreshStarted => EventKind::RefreshStarted,
            InboundEvent::RefreshCompleted => EventKind::RefreshCompleted,
            InboundEvent::Error { .. } => EventKind::Error,
            InboundEvent::ContextSnapshot { .. } => EventKind::ContextSnapshot,
            InboundEvent::ImpactResult { .. } => EventKind::ImpactResult,
            InboundEvent::ModuleDetail { .. } => EventKind::ModuleDetail,
        }
    }
}

/// Requests the view sends to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundRequest {
    RequestDigest,
    RequestIssues,
    RequestFileIndex,
    RequestEdges,
    RequestDiagnostics,
    /// Force a full re-index.
    RequestRefresh,
    /// Ask for a fresh [`InboundEvent::ContextSnapshot`].
    RequestContext,
    RequestImpact { target: String },
    RequestModuleDetail { target: String },
    AddToContext {
        kind: ContextKind,
        payload: serde_json::Value,
    },
}

/// Something that carries a correlation key echoed between a request and
/// its response.
pub trait Correlated {
    fn correlation_key(&self) -> Option<&str>;
}

impl Correlated for OutboundRequest {
    fn correlation_key(&self) -> Option<&str> {
        match self {
            OutboundRequest::RequestImpact { target }
            | OutboundRequest::RequestModuleDetail { target } => Some(target.as_str()),
            _ => None,
        }
    }
}

impl Correlated for InboundEvent {
    fn correlation_key(&self) -> Option<&str> {
        match self {
            InboundEvent::ImpactResult { target, .. } => Some(target.as_str()),
            InboundEvent::ModuleDetail { path, .. } => Some(path.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to decode backend event: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Parse one text frame from the backend.
pub fn decode_event(text: &str) -> Result<InboundEvent, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

/// Serialize one request for the backend.
pub fn encode_request(request: &OutboundRequest) -> Result<String, ProtocolError> {
    serde_json::to_string(request).map_err(ProtocolError::Encode)
}
