//! Shared inbound channel backed by a `tokio::sync::broadcast` channel.
//!
//! Every backend event is published once and fanned out to the view's event
//! loop and to any correlated request currently waiting for a response.

use tokio::sync::broadcast;

use crate::protocol::InboundEvent;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

pub struct EventBus {
    sender: broadcast::Sender<InboundEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current listener. With no listeners the
    /// event is dropped.
    pub fn publish(&self, event: InboundEvent) {
        let _ = self.sender.send(event);
    }

    /// Register a listener. It sees every event published after this call
    /// and is removed when the receiver is dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.sender.subscribe()
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_multiple_listeners_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(InboundEvent::RefreshStarted);

        assert_eq!(rx1.recv().await.unwrap(), InboundEvent::RefreshStarted);
        assert_eq!(rx2.recv().await.unwrap(), InboundEvent::RefreshStarted);
    }

    #[test]
    fn test_listener_count_tracks_drops() {
        let bus = EventBus::default();
        assert_eq!(bus.listener_count(), 0);
        let rx = bus.subscribe();
        assert_eq!(bus.listener_count(), 1);
        drop(rx);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_publish_without_listeners_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(InboundEvent::RefreshCompleted);
    }
}
