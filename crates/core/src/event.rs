//! Domain event system — decoupled observability for the pipeline.
//!
//! Events are published when something interesting happens in the system.
//! Subscribers (the gateway's SSE stream, log sinks) react without the
//! pipeline knowing they exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A session was created
    SessionCreated {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A batch of telemetry events was uploaded
    EventsUploaded {
        session_id: String,
        added: usize,
        duplicates: usize,
        timestamp: DateTime<Utc>,
    },

    /// The classifier assigned an intent to a chat turn
    IntentClassified {
        session_id: String,
        intent: String,
        timestamp: DateTime<Utc>,
    },

    /// One retrieval source failed and contributed an empty result set
    RetrievalFailed {
        session_id: String,
        source: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The generator produced a response (or its fallback)
    ResponseGenerated {
        session_id: String,
        intent: String,
        tokens_used: usize,
        fallback: bool,
        timestamp: DateTime<Utc>,
    },

    /// Documents were ingested into the knowledge base
    DocumentsIngested {
        chunks: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they
/// care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::IntentClassified {
            session_id: "s1".into(),
            intent: "debug".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::IntentClassified { intent, .. } if intent == "debug"
        ));
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::DocumentsIngested {
            chunks: 3,
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn event_serialization_tags_type() {
        let event = DomainEvent::RetrievalFailed {
            session_id: "s1".into(),
            source: "knowledge_base".into(),
            error: "boom".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("retrieval_failed"));
        assert!(json.contains("knowledge_base"));
    }
}
