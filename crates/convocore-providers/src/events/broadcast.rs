//! In-process [`EventPublisher`] backed by a `tokio::sync::broadcast` channel.

use std::sync::Arc;

use async_trait::async_trait;
use convocore_domain::error::Result;
use convocore_domain::events::{DomainEvent, EventPublisher};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default channel capacity: enough to absorb a scheduler burst before a
/// slow subscriber starts lagging.
const EVENT_BUS_BUFFER_SIZE: usize = 256;

/// Publishes [`DomainEvent`]s to every live subscriber of an in-process
/// broadcast channel. Events published with no subscribers are dropped
/// silently — this is a notification bus, not a durable log.
#[derive(Clone)]
pub struct BroadcastEventPublisher {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl BroadcastEventPublisher {
    /// Creates a publisher with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(EVENT_BUS_BUFFER_SIZE);
        Self { sender: Arc::new(sender) }
    }

    /// Subscribes to the event stream. Intended for in-process consumers
    /// (e.g. a CLI `--watch` mode); not exposed over the MCP tool surface.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BroadcastEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastEventPublisher")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        match self.sender.send(event) {
            Ok(count) => debug!(subscribers = count, "published domain event"),
            Err(_) => debug!("published domain event with no subscribers"),
        }
        Ok(())
    }

    fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_subscriber() {
        let bus = BroadcastEventPublisher::new();
        let mut rx = bus.subscribe();
        assert!(bus.has_subscribers());

        bus.publish(DomainEvent::SchedulerTick { evaluated: 3, indexed: 1 }).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, DomainEvent::SchedulerTick { evaluated: 3, indexed: 1 });
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_error() {
        let bus = BroadcastEventPublisher::new();
        assert!(!bus.has_subscribers());
        bus.publish(DomainEvent::SchedulerTick { evaluated: 0, indexed: 0 }).await.unwrap();
    }

    #[tokio::test]
    async fn lagging_subscriber_sees_lagged_error_not_a_panic() {
        let bus = BroadcastEventPublisher::new();
        let mut rx = bus.subscribe();
        for i in 0..(EVENT_BUS_BUFFER_SIZE + 10) {
            bus.publish(DomainEvent::SchedulerTick { evaluated: i, indexed: 0 }).await.unwrap();
        }
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            other => panic!("expected Lagged, got {other:?}"),
        }
    }
}
