//! ==============================================================================
//! hub.rs - live subscriber fan-out
//! ==============================================================================
//!
//! purpose:
//!     tracks connected websocket subscribers, one unbounded channel each.
//!     every hub message is serialized once and pushed to all of them;
//!     subscribers whose channel has closed are dropped on the next send.
//!
//! relationships:
//!     - implements: dispatcher.rs BroadcastSink
//!     - used by: web.rs (register/unregister per websocket)
//!
//! publishing never awaits, so the bus callback can call it from any thread.
//!
//! ==============================================================================

use crate::dispatcher::{BroadcastSink, HubMessage};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::Span;

/// Subscriber id
pub type ConnectionId = u64;

/// RealtimeHub instance
pub struct RealtimeHub {
    connections: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
    span: Span,
}

impl RealtimeHub {
    /// Create new RealtimeHub
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            span: tracing::info_span!("realtime_hub"),
        }
    }

    /// log under `span` instead of the default component span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Register a new subscriber
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let _enter = self.span.enter();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let count = {
            let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);
            connections.insert(id, tx);
            connections.len()
        };

        tracing::info!(connection_id = id, active = count, "Subscriber connected");
        (id, rx)
    }

    /// Unregister a subscriber
    pub fn unregister(&self, id: ConnectionId) {
        let _enter = self.span.enter();
        let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);
        if connections.remove(&id).is_some() {
            tracing::info!(connection_id = id, active = connections.len(), "Subscriber disconnected");
        }
    }

    /// Get connection count
    pub fn connection_count(&self) -> usize {
        self.connections.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Broadcast message to all subscribers
    pub fn broadcast(&self, message: &HubMessage) {
        let _enter = self.span.enter();
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                return;
            }
        };

        let mut dead = Vec::new();
        {
            let connections = self.connections.read().unwrap_or_else(PoisonError::into_inner);
            if connections.is_empty() {
                return;
            }
            tracing::debug!(
                message_type = message.kind(),
                client_count = connections.len(),
                "Broadcasting message"
            );
            for (id, tx) in connections.iter() {
                if tx.send(json.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);
            for id in dead {
                connections.remove(&id);
                tracing::warn!(connection_id = id, "Dropping subscriber with closed channel");
            }
        }
    }
}

impl BroadcastSink for RealtimeHub {
    fn publish(&self, message: &HubMessage) {
        self.broadcast(message);
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Implementation, SensorDescriptor, SensorValue};
    use crate::store::SensorStore;

    fn update_message() -> HubMessage {
        let store = SensorStore::new();
        store.register(SensorDescriptor::new("t", "T", "temperature", Implementation::Gauge));
        HubMessage::Update {
            topic: "t".into(),
            data: store.update("t", SensorValue::Number(1.0)).unwrap(),
        }
    }

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let hub = RealtimeHub::new();
        let (_a, mut rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();

        hub.broadcast(&update_message());

        let a = rx_a.try_recv().unwrap();
        let b = rx_b.try_recv().unwrap();
        assert_eq!(a, b);
        let json: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["topic"], "t");
    }

    #[test]
    fn test_closed_subscriber_is_dropped() {
        let hub = RealtimeHub::new();
        let (_a, rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();
        drop(rx_a);

        hub.broadcast(&update_message());
        assert_eq!(hub.connection_count(), 1);
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_register_unregister() {
        let hub = RealtimeHub::new();
        let (a, _rx_a) = hub.register();
        let (b, _rx_b) = hub.register();
        assert_ne!(a, b);
        assert_eq!(hub.connection_count(), 2);

        hub.unregister(a);
        hub.unregister(a);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_hub_with_injected_span() {
        let hub = RealtimeHub::new().with_span(tracing::info_span!("dashboard", port = 8000));
        let (id, mut rx) = hub.register();
        hub.publish(&update_message());
        assert!(rx.try_recv().is_ok());
        hub.unregister(id);
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn test_broadcast_without_subscribers_is_noop() {
        let hub = RealtimeHub::new();
        hub.publish(&update_message());
        assert_eq!(hub.connection_count(), 0);
    }
}
