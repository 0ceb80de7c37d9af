//! Request/response correlation over the shared inbound channel
//!
//! Each call arms its own listener before sending, waits for the first event
//! of the expected kind whose correlation key matches the request's, and
//! gives up with `None` when its deadline passes. The listener is owned by
//! the call's future, so it is released exactly once whichever way the call
//! ends, and an event arriving afterwards reaches nobody.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use understory_core::{ImpactResult, ModuleInfo};

use crate::bus::EventBus;
use crate::protocol::{Correlated, EventKind, InboundEvent, OutboundRequest};
use crate::transport::Transport;

/// Deadline used when the caller does not pass one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct RequestCorrelator {
    bus: Arc<EventBus>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl RequestCorrelator {
    pub fn new(bus: Arc<EventBus>, transport: Arc<dyn Transport>) -> Self {
        Self {
            bus,
            transport,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `request` and wait for a response of kind `expected` whose
    /// correlation key equals the request's.
    pub async fn request(
        &self,
        request: OutboundRequest,
        expected: EventKind,
    ) -> Option<InboundEvent> {
        self.request_with(
            request,
            expected,
            |c: &dyn Correlated| c.correlation_key().map(str::to_string),
            self.timeout,
        )
        .await
    }

    /// Generic form: `match_key` is applied to both the request and each
    /// candidate event, and the two results must be equal.
    ///
    /// Resolves `None` on timeout or if the channel closes. Timeouts are a
    /// normal outcome; callers retry by calling again.
    pub async fn request_with<F>(
        &self,
        request: OutboundRequest,
        expected: EventKind,
        match_key: F,
        timeout: Duration,
    ) -> Option<InboundEvent>
    where
        F: Fn(&dyn Correlated) -> Option<String> + Send + Sync,
    {
        // Armed before sending so a fast response cannot slip past.
        let mut listener = self.bus.subscribe();
        let wanted = match_key(&request as &dyn Correlated);
        let description = format!("{:?}", request);

        if let Err(e) = self.transport.send(request).await {
            warn!("Failed to send {}: {}", description, e);
            return None;
        }

        let wait = async move {
            loop {
                match listener.recv().await {
                    Ok(event) => {
                        if event.kind() == expected && match_key(&event as &dyn Correlated) == wanted {
                            return Some(event);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Correlated request lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(response) => response,
            Err(_) => {
                debug!("No {:?} response for {} within {:?}", expected, description, timeout);
                None
            }
        }
    }

    /// Impact analysis for one file.
    pub async fn impact(&self, target: &str) -> Option<ImpactResult> {
        let request = OutboundRequest::RequestImpact {
            target: target.to_string(),
        };
        match self.request(request, EventKind::ImpactResult).await? {
            InboundEvent::ImpactResult { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Module detail for one file.
    pub async fn module_detail(&self, target: &str) -> Option<ModuleInfo> {
        let request = OutboundRequest::RequestModuleDetail {
            target: target.to_string(),
        };
        match self.request(request, EventKind::ModuleDetail).await? {
            InboundEvent::ModuleDetail { info, .. } => Some(info),
            _ => None,
        }
    }
}
