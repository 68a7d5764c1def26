//! ==============================================================================
//! lib.rs - telemetry host library
//! ==============================================================================
//!
//! purpose:
//!     tracks the latest value and bounded history of mqtt sensor topics and
//!     streams changes to dashboard subscribers.
//!
//! pipeline:
//!
//! ```text
//! mqtt ──(topic, value)──> UpdateDispatcher ──> SensorStore (convert, truncate, record)
//!                                 │
//!                                 └──(update snapshot)──> RealtimeHub ──> websocket clients
//! ```
//!
//! ==============================================================================

pub mod config;
pub mod conversions;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod hub;
pub mod mqtt;
pub mod store;
pub mod web;

pub use dispatcher::{BroadcastSink, HubMessage, UpdateDispatcher};
pub use domain::{HistoryEntry, Implementation, SensorDescriptor, SensorSnapshot, SensorValue};
pub use error::{Error, Result};
pub use hub::RealtimeHub;
pub use store::SensorStore;
