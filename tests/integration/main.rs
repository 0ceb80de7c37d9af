//! Integration tests for Understory
//!
//! These run a full view session against an in-memory analysis backend that
//! answers requests over the same channels the WebSocket link uses.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use understory_client::{
    ChannelTransport, EventBus, InboundEvent, OutboundRequest, ViewConfig, ViewSession,
    ViewStatus, Visibility,
};
use understory_core::{
    AffectedFile, ContextItem, ContextKind, Digest, EdgeKind, EntrypointsByCategory, GraphEdge,
    Hotspot, ImpactResult, NodeKind, RiskLevel,
};

/// What the fake backend serves.
#[derive(Default)]
struct Backend {
    digest: Digest,
    edges: Vec<GraphEdge>,
    /// Fail the first digest request with this message.
    fail_first_digest: Option<String>,
    context: Vec<ContextItem>,
    refreshes: usize,
}

impl Backend {
    fn respond(&mut self, request: OutboundRequest) -> Vec<InboundEvent> {
        match request {
            OutboundRequest::RequestDigest => match self.fail_first_digest.take() {
                Some(message) => vec![InboundEvent::Error { message }],
                None => vec![InboundEvent::DigestReady {
                    digest: self.digest.clone(),
                }],
            },
            OutboundRequest::RequestIssues => vec![InboundEvent::IssuesReady { issues: vec![] }],
            OutboundRequest::RequestEdges => vec![InboundEvent::EdgesReady {
                edges: self.edges.clone(),
            }],
            OutboundRequest::RequestDiagnostics => vec![InboundEvent::DiagnosticsReady {
                diagnostics: Default::default(),
            }],
            OutboundRequest::RequestFileIndex => {
                vec![InboundEvent::FileIndexReady { files: vec![] }]
            }
            OutboundRequest::RequestContext => vec![InboundEvent::ContextSnapshot {
                items: self.context.clone(),
            }],
            OutboundRequest::RequestRefresh => {
                self.refreshes += 1;
                vec![
                    InboundEvent::RefreshStarted,
                    InboundEvent::DigestReady {
                        digest: self.digest.clone(),
                    },
                    InboundEvent::EdgesReady {
                        edges: self.edges.clone(),
                    },
                    InboundEvent::RefreshCompleted,
                ]
            }
            OutboundRequest::RequestImpact { target } => vec![InboundEvent::ImpactResult {
                result: ImpactResult {
                    target: target.clone(),
                    risk_level: RiskLevel::High,
                    summary: format!("{target} is widely imported"),
                    affected_files: vec![AffectedFile {
                        path: "b.ts".to_string(),
                        is_entrypoint: false,
                        distance: 1,
                    }],
                },
                target,
            }],
            // Never answered, to exercise the timeout path.
            OutboundRequest::RequestModuleDetail { .. } => vec![],
            OutboundRequest::AddToContext { kind, payload } => {
                self.context.push(ContextItem::new(kind, payload));
                vec![InboundEvent::ContextSnapshot {
                    items: self.context.clone(),
                }]
            }
        }
    }
}

fn spawn_backend(
    backend: Arc<Mutex<Backend>>,
    bus: Arc<EventBus>,
    mut requests: mpsc::UnboundedReceiver<OutboundRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let events = backend.lock().unwrap().respond(request);
            for event in events {
                bus.publish(event);
            }
        }
    })
}

struct Harness {
    bus: Arc<EventBus>,
    backend: Arc<Mutex<Backend>>,
    session: ViewSession,
    _backend_task: JoinHandle<()>,
}

async fn start(backend: Backend, config: ViewConfig) -> Harness {
    let bus = Arc::new(EventBus::default());
    let (transport, requests) = ChannelTransport::new();
    let backend = Arc::new(Mutex::new(backend));
    let backend_task = spawn_backend(Arc::clone(&backend), Arc::clone(&bus), requests);
    let session = ViewSession::start(Arc::clone(&bus), Arc::new(transport), &config)
        .await
        .unwrap();
    Harness {
        bus,
        backend,
        session,
        _backend_task: backend_task,
    }
}

async fn wait_for_status(session: &ViewSession, expected: ViewStatus) {
    let view = session.view();
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while view.status().await != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "view never reached {expected:?}");
}

fn scenario_backend() -> Backend {
    Backend {
        digest: Digest {
            hotspots: vec![Hotspot {
                path: "a.ts".to_string(),
                importers: 10,
                exports: 2,
            }],
            entrypoints_by_category: EntrypointsByCategory {
                routes: vec!["a.ts".to_string()],
                ..Default::default()
            },
            ..Default::default()
        },
        edges: vec![GraphEdge::new("b.ts", "a.ts", EdgeKind::Import)],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_scenario_end_to_end() {
    let h = start(scenario_backend(), ViewConfig::default()).await;
    wait_for_status(&h.session, ViewStatus::Ready).await;

    let view = h.session.view();
    // Edges arrive after the digest; wait for the expanded node.
    tokio::time::timeout(Duration::from_secs(5), async {
        while view.model().await.nodes.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let model = view.model().await;
    let a = model.node("a.ts").unwrap();
    assert_eq!(a.kind, NodeKind::Entrypoint);
    assert!(a.is_hotspot);
    assert!(a.is_entrypoint);
    assert_eq!(a.importer_count, 1);

    let b = model.node("b.ts").unwrap();
    assert_eq!(b.kind, NodeKind::File);
    assert_eq!(b.size_hint, 5);

    assert_eq!(model.links, vec![GraphEdge::new("b.ts", "a.ts", EdgeKind::Import)]);
    assert!(!view.in_flight().is_loading());
}

#[tokio::test]
async fn test_empty_backend_shows_empty_state() {
    let h = start(Backend::default(), ViewConfig::default()).await;
    wait_for_status(&h.session, ViewStatus::Empty).await;
    assert!(h.session.view().model().await.is_empty());
}

#[tokio::test]
async fn test_backend_error_then_retry() {
    let backend = Backend {
        fail_first_digest: Some("index failed".to_string()),
        ..scenario_backend()
    };
    let h = start(backend, ViewConfig::default()).await;
    wait_for_status(
        &h.session,
        ViewStatus::Error {
            message: "index failed".to_string(),
        },
    )
    .await;

    h.session.view().retry().await.unwrap();
    wait_for_status(&h.session, ViewStatus::Ready).await;
    assert_eq!(h.backend.lock().unwrap().refreshes, 1);

    let view = h.session.view();
    tokio::time::timeout(Duration::from_secs(5), async {
        while view.in_flight().is_refreshing() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_context_follows_backend_snapshots() {
    let h = start(scenario_backend(), ViewConfig::default()).await;
    wait_for_status(&h.session, ViewStatus::Ready).await;
    let view = h.session.view();

    let key = view
        .add_to_context(ContextKind::Hotspot, json!({ "path": "a.ts", "importers": 10 }))
        .await
        .unwrap();
    assert_eq!(key.as_deref(), Some("a.ts"));
    assert!(view.in_context("a.ts").await);

    // The backend drops everything from its context.
    h.backend.lock().unwrap().context.clear();
    h.bus.publish(InboundEvent::ContextSnapshot { items: vec![] });

    tokio::time::timeout(Duration::from_secs(5), async {
        while view.in_context("a.ts").await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert!(view.context_keys().await.is_empty());
}

#[tokio::test]
async fn test_correlated_queries() {
    let config = ViewConfig {
        request_timeout_ms: 200,
        ..Default::default()
    };
    let h = start(scenario_backend(), config).await;
    wait_for_status(&h.session, ViewStatus::Ready).await;
    let view = h.session.view();
    let baseline = h.bus.listener_count();

    let (first, second) = tokio::join!(view.impact("a.ts"), view.impact("b.ts"));
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.target, "a.ts");
    assert_eq!(second.target, "b.ts");
    assert_eq!(first.risk_level, RiskLevel::High);
    assert_eq!(first.by_distance()[0].path, "b.ts");

    // Never answered.
    assert!(view.module_detail("a.ts").await.is_none());
    assert_eq!(h.bus.listener_count(), baseline);
}

#[tokio::test(start_paused = true)]
async fn test_hidden_view_stops_background_refresh() {
    let config = ViewConfig {
        refresh_interval_ms: 1000,
        ..Default::default()
    };
    let h = start(scenario_backend(), config).await;
    wait_for_status(&h.session, ViewStatus::Ready).await;

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let while_visible = h.backend.lock().unwrap().refreshes;
    assert!(while_visible >= 1);

    h.session.set_visibility(Visibility::Hidden);
    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert_eq!(h.backend.lock().unwrap().refreshes, while_visible);

    h.session.set_visibility(Visibility::Visible);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.backend.lock().unwrap().refreshes, while_visible + 1);
}

#[tokio::test]
async fn test_shutdown_releases_listeners() {
    let mut h = start(scenario_backend(), ViewConfig::default()).await;
    wait_for_status(&h.session, ViewStatus::Ready).await;
    assert_eq!(h.bus.listener_count(), 1);

    h.session.shutdown();
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.bus.listener_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}
