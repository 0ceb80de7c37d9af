//! Graph view session: applies backend events to the stores and keeps the
//! assembled model, selection and context state current

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use understory_core::{
    ContextKind, DiffEngine, Digest, GraphModel, GraphNode, ImpactResult, ModelDiff, ModuleInfo,
    Selection, SelectionModel, Stores,
};

use crate::bus::EventBus;
use crate::config::ViewConfig;
use crate::context::ContextTracker;
use crate::correlator::RequestCorrelator;
use crate::protocol::{InboundEvent, OutboundRequest};
use crate::scheduler::{self, InFlight, Refresh, RefreshScheduler, Visibility};
use crate::transport::{Transport, TransportError};

/// Capacity of the model diff channel handed to renderers.
const DIFF_CHANNEL_CAPACITY: usize = 64;

/// What the view should show instead of, or as, the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ViewStatus {
    /// Waiting for the first digest.
    Loading,
    Ready,
    /// The digest has no hotspots or entrypoints.
    Empty,
    /// The backend reported a failure. Retry with [`GraphView::retry`].
    Error { message: String },
}

pub struct GraphView {
    transport: Arc<dyn Transport>,
    stores: RwLock<Stores>,
    model: RwLock<GraphModel>,
    status: RwLock<ViewStatus>,
    selection: RwLock<SelectionModel>,
    diff_engine: RwLock<DiffEngine>,
    diff_tx: broadcast::Sender<ModelDiff>,
    in_flight: InFlight,
    context: ContextTracker,
    correlator: RequestCorrelator,
}

impl GraphView {
    pub fn new(bus: Arc<EventBus>, transport: Arc<dyn Transport>, config: &ViewConfig) -> Self {
        let (diff_tx, _) = broadcast::channel(DIFF_CHANNEL_CAPACITY);
        Self {
            transport: Arc::clone(&transport),
            stores: RwLock::new(Stores::new()),
            model: RwLock::new(GraphModel::default()),
            status: RwLock::new(ViewStatus::Loading),
            selection: RwLock::new(SelectionModel::new()),
            diff_engine: RwLock::new(DiffEngine::new()),
            diff_tx,
            in_flight: InFlight::new(),
            context: ContextTracker::new(Arc::clone(&transport)),
            correlator: RequestCorrelator::new(bus, transport)
                .with_timeout(config.request_timeout()),
        }
    }

    /// Request everything the view needs. Marks the initial load in flight
    /// until the digest arrives.
    pub async fn initial_load(&self) -> Result<(), TransportError> {
        self.in_flight.begin_load();
        *self.status.write().await = ViewStatus::Loading;
        info!("Requesting initial view data");
        for request in [
            OutboundRequest::RequestDigest,
            OutboundRequest::RequestIssues,
            OutboundRequest::RequestEdges,
            OutboundRequest::RequestDiagnostics,
            OutboundRequest::RequestFileIndex,
            OutboundRequest::RequestContext,
        ] {
            self.transport.send(request).await?;
        }
        Ok(())
    }

    /// Ask the backend for a full re-index unless one is already running.
    pub async fn request_refresh(&self) -> Result<(), TransportError> {
        if !self.in_flight.begin_refresh() {
            debug!("Refresh already in flight");
            return Ok(());
        }
        if let Err(e) = self.transport.send(OutboundRequest::RequestRefresh).await {
            self.in_flight.finish_refresh();
            return Err(e);
        }
        Ok(())
    }

    /// Leave the error state and retry with a full refresh.
    pub async fn retry(&self) -> Result<(), TransportError> {
        *self.status.write().await = ViewStatus::Loading;
        self.request_refresh().await
    }

    /// Apply one backend event.
    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::DigestReady { digest } => {
                // `error` clears the flags, so a refresh in flight here was
                // started after the last error and this digest is its result.
                let recovered = self.in_flight.is_refreshing();
                self.stores.write().await.set_digest(digest);
                self.in_flight.finish_load();
                if recovered {
                    self.clear_error().await;
                }
                self.recompute().await;
            }
            InboundEvent::IssuesReady { issues } => {
                self.stores.write().await.set_issues(issues);
                self.recompute().await;
            }
            InboundEvent::EdgesReady { edges } => {
                self.stores.write().await.set_edges(edges);
                self.recompute().await;
            }
            InboundEvent::DiagnosticsReady { diagnostics } => {
                self.stores.write().await.set_diagnostics(diagnostics);
                self.recompute().await;
            }
            InboundEvent::FileIndexReady { files } => {
                self.stores.write().await.set_file_index(files);
            }
            InboundEvent::RefreshStarted => {
                self.in_flight.begin_refresh();
            }
            InboundEvent::RefreshCompleted => {
                self.in_flight.finish_refresh();
            }
            InboundEvent::Error { message } => {
                warn!("Backend error: {}", message);
                self.in_flight.reset();
                *self.status.write().await = ViewStatus::Error { message };
            }
            InboundEvent::ContextSnapshot { items } => {
                self.context.reconcile(&items).await;
            }
            InboundEvent::ImpactResult { .. } | InboundEvent::ModuleDetail { .. } => {
                // Consumed by whichever correlated request is waiting.
            }
        }
    }

    async fn clear_error(&self) {
        let mut status = self.status.write().await;
        if let ViewStatus::Error { message } = &*status {
            info!("Recovered from backend error: {}", message);
            *status = ViewStatus::Loading;
        }
    }

    async fn recompute(&self) {
        let Some(next) = self.stores.read().await.assemble() else {
            return;
        };

        {
            let mut status = self.status.write().await;
            if !matches!(*status, ViewStatus::Error { .. }) {
                *status = if next.is_empty() {
                    ViewStatus::Empty
                } else {
                    ViewStatus::Ready
                };
            }
        }

        let diff = {
            let mut model = self.model.write().await;
            let diff = self.diff_engine.write().await.compute_diff(&model, &next);
            *model = next;
            self.selection.write().await.retain_if_present(&model.node_ids());
            diff
        };

        debug!(
            sequence = diff.sequence,
            added = diff.added_nodes.len(),
            removed = diff.removed_nodes.len(),
            "Model recomputed"
        );
        if !diff.is_empty() {
            // No receivers just means no renderer is attached.
            let _ = self.diff_tx.send(diff);
        }
    }

    /// Start applying events from `bus`. The listener is armed before this
    /// returns, so requests sent afterwards cannot race it.
    pub fn spawn_event_loop(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut events = bus.subscribe();
        let view = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => view.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("View event loop lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("View event loop finished");
        })
    }

    pub async fn model(&self) -> GraphModel {
        self.model.read().await.clone()
    }

    pub async fn status(&self) -> ViewStatus {
        self.status.read().await.clone()
    }

    pub async fn digest(&self) -> Option<Digest> {
        self.stores.read().await.digest().cloned()
    }

    /// Flat file listing from the latest file index.
    pub async fn file_nodes(&self) -> Vec<GraphNode> {
        self.stores.read().await.assemble_file_index()
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn subscribe_diffs(&self) -> broadcast::Receiver<ModelDiff> {
        self.diff_tx.subscribe()
    }

    /// The current model with the sequence of the last diff applied to it.
    /// Diffs with a higher sequence come after this model.
    pub async fn snapshot(&self) -> (u64, GraphModel) {
        let model = self.model.read().await;
        let sequence = self.diff_engine.read().await.sequence();
        (sequence, model.clone())
    }

    pub async fn diff_sequence(&self) -> u64 {
        self.diff_engine.read().await.sequence()
    }

    pub async fn select(&self, node_id: &str) -> Selection {
        let model = self.model.read().await;
        self.selection
            .write()
            .await
            .select(node_id, &model.links)
            .clone()
    }

    pub async fn hover(&self, node_id: Option<&str>) {
        self.selection.write().await.hover(node_id);
    }

    pub async fn clear_selection(&self) {
        self.selection.write().await.clear();
    }

    pub async fn selection(&self) -> Option<Selection> {
        self.selection.read().await.selection().cloned()
    }

    pub async fn impact(&self, target: &str) -> Option<ImpactResult> {
        self.correlator.impact(target).await
    }

    pub async fn module_detail(&self, target: &str) -> Option<ModuleInfo> {
        self.correlator.module_detail(target).await
    }

    /// Module detail derived from the stored edges and issues, without
    /// asking the backend.
    pub async fn local_module_info(&self, target: &str) -> Option<ModuleInfo> {
        self.stores.read().await.module_info(target)
    }

    pub async fn add_to_context(
        &self,
        kind: ContextKind,
        payload: serde_json::Value,
    ) -> Result<Option<String>, TransportError> {
        self.context.add(kind, payload).await
    }

    pub async fn context_keys(&self) -> Vec<String> {
        self.context.keys().await
    }

    pub async fn in_context(&self, key: &str) -> bool {
        self.context.contains(key).await
    }
}

#[async_trait::async_trait]
impl Refresh for GraphView {
    async fn refresh(&self) {
        if let Err(e) = self.request_refresh().await {
            warn!("Scheduled refresh failed: {}", e);
        }
    }
}

/// A running view: event loop, refresh scheduler and visibility signal.
/// Dropping or shutting it down releases every listener and timer.
pub struct ViewSession {
    view: Arc<GraphView>,
    event_loop: Option<JoinHandle<()>>,
    scheduler: RefreshScheduler,
    visibility: watch::Sender<Visibility>,
}

impl ViewSession {
    /// Wire up the view, start the event loop and scheduler, and issue the
    /// initial load.
    pub async fn start(
        bus: Arc<EventBus>,
        transport: Arc<dyn Transport>,
        config: &ViewConfig,
    ) -> Result<Self, TransportError> {
        let view = Arc::new(GraphView::new(Arc::clone(&bus), transport, config));
        let event_loop = view.spawn_event_loop(&bus);

        let (visibility, visibility_rx) = watch::channel(Visibility::Visible);
        let scheduler = RefreshScheduler::start(
            config.refresh_interval(),
            view.in_flight().clone(),
            visibility_rx,
            Arc::clone(&view),
        );

        let session = Self {
            view,
            event_loop: Some(event_loop),
            scheduler,
            visibility,
        };
        session.view.initial_load().await?;
        Ok(session)
    }

    pub fn view(&self) -> Arc<GraphView> {
        Arc::clone(&self.view)
    }

    /// Signal from the hosting surface.
    pub fn set_visibility(&self, visibility: Visibility) {
        scheduler::set_visibility(&self.visibility, visibility);
    }

    pub fn visibility_sender(&self) -> watch::Sender<Visibility> {
        self.visibility.clone()
    }

    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        if let Some(handle) = self.event_loop.take() {
            handle.abort();
            info!("View session shut down");
        }
    }
}

impl Drop for ViewSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
