//! Tracks which graph items are queued in the backend's analysis context

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use understory_core::{ContextItem, ContextKind};

use crate::protocol::OutboundRequest;
use crate::transport::{Transport, TransportError};

/// Local mirror of the keys in the backend-owned analysis context.
///
/// `add` marks optimistically; `reconcile` replaces the whole set with the
/// server's snapshot. A snapshot computed before a recent `add` can briefly
/// un-mark that item; there is no ordering guard.
pub struct ContextTracker {
    transport: Arc<dyn Transport>,
    keys: RwLock<HashSet<String>>,
}

impl ContextTracker {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            keys: RwLock::new(HashSet::new()),
        }
    }

    /// Send `addToContext` and mark the derived key right away, without
    /// waiting for an acknowledgment. Returns the key that was marked.
    pub async fn add(
        &self,
        kind: ContextKind,
        payload: serde_json::Value,
    ) -> Result<Option<String>, TransportError> {
        let key = kind.derive_key(&payload);
        self.transport
            .send(OutboundRequest::AddToContext { kind, payload })
            .await?;

        if let Some(ref key) = key {
            debug!("Marked {} as added to context", key);
            self.keys.write().await.insert(key.clone());
        }
        Ok(key)
    }

    /// Replace the local set with the keys of `items`. Never merges.
    pub async fn reconcile(&self, items: &[ContextItem]) {
        let server_keys: HashSet<String> = items.iter().filter_map(ContextItem::key).collect();
        debug!("Reconciled context: {} items", server_keys.len());
        *self.keys.write().await = server_keys;
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.keys.read().await.contains(key)
    }

    /// Current keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.keys.read().await.iter().cloned().collect();
        keys.sort();
        keys
    }
}
