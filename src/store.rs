//! ==============================================================================
//! store.rs - per-topic sensor state
//! ==============================================================================
//!
//! purpose:
//!     owns one state record per registered topic and is the only writer of it.
//!     every accepted update is converted, truncated, timestamped and folded
//!     into the record; callers only ever get owned snapshots back.
//!
//! relationships:
//!     - uses: conversions.rs (unit conversion + precision truncation)
//!     - used by: dispatcher.rs (update -> notification), web.rs (get_all)
//!
//! locking:
//!     one RwLock over the whole registry. update/register take it for write,
//!     get/get_all for read, so a full snapshot never sees half an update.
//!     nothing under the lock blocks or awaits.
//!
//! ==============================================================================

use crate::conversions::{self, ConversionTable};
use crate::domain::{HistoryEntry, Implementation, SensorDescriptor, SensorSnapshot, SensorValue};

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::Span;

/// mutable state of one sensor
struct SensorState {
    descriptor: Arc<SensorDescriptor>,
    current_value: Option<SensorValue>,
    last_updated: Option<DateTime<Utc>>,
    history: VecDeque<HistoryEntry>,
    last_switched: Option<DateTime<Utc>>,
}

impl SensorState {
    fn new(descriptor: SensorDescriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            current_value: None,
            last_updated: None,
            history: VecDeque::new(),
            last_switched: None,
        }
    }

    fn apply(&mut self, value: SensorValue, now: DateTime<Utc>) {
        let previous = self.current_value.replace(value.clone());
        self.last_updated = Some(now);

        match self.descriptor.implementation {
            Implementation::Graph => {
                self.history.push_back(HistoryEntry { value, timestamp: now });
                while self.history.len() > self.descriptor.history {
                    self.history.pop_front();
                }
            }
            Implementation::Boolean => {
                // raw comparison; labels are for display only
                if previous.as_ref() != Some(&value) {
                    self.last_switched = Some(now);
                }
            }
            Implementation::Gauge | Implementation::Text => {}
        }
    }

    fn snapshot(&self) -> SensorSnapshot {
        let d = &self.descriptor;
        SensorSnapshot {
            topic: d.topic.clone(),
            name: d.name.clone(),
            sensor_type: d.sensor_type.clone(),
            implementation: d.implementation,
            current_value: self.current_value.clone(),
            history: self.history.iter().cloned().collect(),
            last_updated: self.last_updated,
            min_value: d.min_value,
            max_value: d.max_value,
            true_value: d.true_value.clone(),
            false_value: d.false_value.clone(),
            last_switched: self.last_switched,
            unit: d.unit.clone(),
            input_unit: d.input_unit.clone(),
            precision: d.precision,
        }
    }
}

/// thread-safe registry of sensor states keyed by topic
pub struct SensorStore {
    sensors: RwLock<HashMap<String, SensorState>>,
    conversions: Arc<ConversionTable>,
    span: Span,
}

impl SensorStore {
    /// store backed by the builtin conversion table
    pub fn new() -> Self {
        Self::with_conversions(Arc::new(conversions::builtin_table().clone()))
    }

    pub fn with_conversions(conversions: Arc<ConversionTable>) -> Self {
        Self {
            sensors: RwLock::new(HashMap::new()),
            conversions,
            span: tracing::info_span!("sensor_store"),
        }
    }

    /// log under `span` instead of the default component span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    // a panic can't happen mid-update, so a poisoned map is still consistent
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SensorState>> {
        self.sensors.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SensorState>> {
        self.sensors.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// register a sensor; the first registration of a topic wins
    ///
    /// returns false (and logs a warning) when the topic already exists.
    pub fn register(&self, descriptor: SensorDescriptor) -> bool {
        let _enter = self.span.enter();
        let mut sensors = self.write();
        if sensors.contains_key(&descriptor.topic) {
            tracing::warn!(
                topic = %descriptor.topic,
                name = %descriptor.name,
                "Duplicate topic, keeping the first registration"
            );
            return false;
        }
        tracing::info!(
            topic = %descriptor.topic,
            name = %descriptor.name,
            implementation = ?descriptor.implementation,
            "Registered sensor"
        );
        sensors.insert(descriptor.topic.clone(), SensorState::new(descriptor));
        true
    }

    /// convert + truncate according to the descriptor
    ///
    /// only values that parse as numbers AND have a transform configured are
    /// rewritten; everything else is stored verbatim.
    fn transform(&self, descriptor: &SensorDescriptor, raw: SensorValue) -> SensorValue {
        let Some(mut n) = raw.as_number() else {
            return raw;
        };
        let unit_in = descriptor.input_unit.as_deref();
        let unit_out = descriptor.unit.as_deref();
        let converts = unit_in.is_some() && unit_out.is_some() && unit_in != unit_out;
        let step = descriptor.precision.filter(|p| *p > 0.0);
        if !converts && step.is_none() {
            return raw;
        }
        if converts {
            n = self.conversions.convert(n, unit_in, unit_out);
        }
        if let Some(step) = step {
            n = conversions::truncate(n, step);
        }
        if !n.is_finite() {
            tracing::debug!(topic = %descriptor.topic, value = ?raw, "Transform overflowed, keeping raw value");
            return raw;
        }
        SensorValue::Number(n)
    }

    /// fold a raw value into the topic's state
    ///
    /// `None` when the topic was never registered; the message is dropped.
    pub fn update(&self, topic: &str, raw: SensorValue) -> Option<SensorSnapshot> {
        let _enter = self.span.enter();
        let mut sensors = self.write();
        let Some(state) = sensors.get_mut(topic) else {
            tracing::debug!(topic = %topic, "Dropping message for unregistered topic");
            return None;
        };
        let value = self.transform(&state.descriptor, raw);
        state.apply(value, Utc::now());
        Some(state.snapshot())
    }

    pub fn get(&self, topic: &str) -> Option<SensorSnapshot> {
        self.read().get(topic).map(SensorState::snapshot)
    }

    /// consistent snapshot of every sensor
    pub fn get_all(&self) -> HashMap<String, SensorSnapshot> {
        self.read()
            .iter()
            .map(|(topic, state)| (topic.clone(), state.snapshot()))
            .collect()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.read().contains_key(topic)
    }

    pub fn topics(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Default for SensorStore {
    fn default() -> Self {
        Self::new()
    }
}
