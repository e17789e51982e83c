//! Change notifications published by the store
//!
//! Rendering layers subscribe to these to know when to re-read state.

use tokio::sync::broadcast;
use tracing::debug;

use crate::messaging::Lifecycle;

/// Default capacity of the store's notification channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something observable changed in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A new layout replaced the previous one
    ConfigApplied { resources: usize, panels: usize },

    /// A panel's current index moved
    NavigationChanged {
        panel_id: String,
        index: usize,
        resource_id: Option<String>,
    },

    MessageSent {
        message_id: String,
        from_resource_id: String,
        to_resource_id: Option<String>,
        lifecycle: Lifecycle,
    },

    MessageConsumed { message_id: String },

    /// Messages for a resource were cleared, wholly or by state key
    MessagesCleared { resource_id: String, count: usize },

    /// Persisted state was applied after configuration
    StateRestored { panels: usize, messages: usize },
}

impl StoreEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConfigApplied { .. } => "ConfigApplied",
            Self::NavigationChanged { .. } => "NavigationChanged",
            Self::MessageSent { .. } => "MessageSent",
            Self::MessageConsumed { .. } => "MessageConsumed",
            Self::MessagesCleared { .. } => "MessagesCleared",
            Self::StateRestored { .. } => "StateRestored",
        }
    }
}

/// Fire-and-forget publisher over a broadcast channel
#[derive(Debug, Clone)]
pub(crate) struct EventPublisher {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to current subscribers; no subscribers is fine
    pub fn emit(&self, event: StoreEvent) {
        debug!(event_type = event.event_type(), "EventPublisher::emit");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_emit_without_subscribers() {
        let publisher = EventPublisher::new(8);
        publisher.emit(StoreEvent::ConfigApplied { resources: 1, panels: 1 });
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribers_receive_events() {
        let publisher = EventPublisher::new(8);
        let mut rx1 = publisher.subscribe();
        let mut rx2 = publisher.subscribe();

        publisher.emit(StoreEvent::MessageConsumed {
            message_id: "m1".to_string(),
        });

        assert_eq!(rx1.try_recv().unwrap().event_type(), "MessageConsumed");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "MessageConsumed");
        assert!(matches!(rx1.try_recv(), Err(TryRecvError::Empty)));
    }
}
