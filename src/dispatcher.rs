//! ==============================================================================
//! dispatcher.rs - store updates -> live notifications
//! ==============================================================================
//!
//! purpose:
//!     the seam between the sensor store and whatever fans updates out to live
//!     subscribers. `ingest` is what the bus callback calls.
//!
//! relationships:
//!     - writes: store.rs (update)
//!     - publishes to: any BroadcastSink (hub.rs in the binary)
//!
//! ordering:
//!     the store lock is released before the sink sees a message. a separate
//!     per-topic lock is held across update + publish, so notifications for
//!     one topic reach the sink in commit order. other topics never wait.
//!
//! ==============================================================================

use crate::domain::{SensorSnapshot, SensorValue};
use crate::store::SensorStore;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Span;

/// Hub message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    /// Full registry, sent once to a new subscriber
    Init { data: HashMap<String, SensorSnapshot> },
    /// One accepted update
    Update { topic: String, data: SensorSnapshot },
}

impl HubMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            HubMessage::Init { .. } => "init",
            HubMessage::Update { .. } => "update",
        }
    }
}

/// Receives change notifications; implemented by the live fan-out layer
///
/// Called from whatever thread delivered the bus message, so it must not
/// block on subscribers or call back into `ingest` for the same topic.
pub trait BroadcastSink: Send + Sync {
    fn publish(&self, message: &HubMessage);
}

/// Applies bus messages to the store and forwards accepted ones
pub struct UpdateDispatcher {
    store: Arc<SensorStore>,
    sink: Arc<dyn BroadcastSink>,
    sequencers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    span: Span,
}

impl UpdateDispatcher {
    pub fn new(store: Arc<SensorStore>, sink: Arc<dyn BroadcastSink>) -> Self {
        Self {
            store,
            sink,
            sequencers: Mutex::new(HashMap::new()),
            span: tracing::info_span!("dispatcher"),
        }
    }

    /// log under `span` instead of the default component span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn store(&self) -> &Arc<SensorStore> {
        &self.store
    }

    // only registered topics get a sequencer, so stray topics can't grow the map
    fn sequencer(&self, topic: &str) -> Option<Arc<Mutex<()>>> {
        if !self.store.contains(topic) {
            return None;
        }
        let mut sequencers = self.sequencers.lock().unwrap_or_else(PoisonError::into_inner);
        Some(sequencers.entry(topic.to_string()).or_default().clone())
    }

    /// Apply one `(topic, value)` pair from the bus
    ///
    /// Returns the notification that was published, or `None` when the
    /// topic is not registered.
    pub fn ingest(&self, topic: &str, value: SensorValue) -> Option<HubMessage> {
        let _enter = self.span.enter();
        let Some(sequencer) = self.sequencer(topic) else {
            tracing::debug!(topic = %topic, "Dropping message for unregistered topic");
            return None;
        };
        let _order = sequencer.lock().unwrap_or_else(PoisonError::into_inner);

        let snapshot = self.store.update(topic, value)?;
        let message = HubMessage::Update {
            topic: topic.to_string(),
            data: snapshot,
        };
        tracing::trace!(topic = %topic, "Publishing sensor update");
        self.sink.publish(&message);
        Some(message)
    }

    /// Point-in-time view of every sensor for a newly connected subscriber
    pub fn init_message(&self) -> HubMessage {
        HubMessage::Init {
            data: self.store.get_all(),
        }
    }
}
