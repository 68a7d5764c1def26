use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// a sensor value as received from the bus
///
/// serializes untagged, so the wire sees a plain number, a plain string or
/// whatever json the publisher sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
    /// booleans, null, arrays and objects
    Structured(serde_json::Value),
}

impl SensorValue {
    /// explicit numeric parse; `None` is a normal branch, not a failure
    ///
    /// numbers pass through, text is parsed after trimming, structured
    /// payloads (including json booleans) never coerce. non-finite results
    /// are rejected so they can't leak into json as `null`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            SensorValue::Number(n) => *n,
            SensorValue::Text(s) => s.trim().parse::<f64>().ok()?,
            SensorValue::Structured(_) => return None,
        };
        n.is_finite().then_some(n)
    }
}

impl From<serde_json::Value> for SensorValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => SensorValue::Number(f),
                None => SensorValue::Structured(serde_json::Value::Number(n)),
            },
            serde_json::Value::String(s) => SensorValue::Text(s),
            other => SensorValue::Structured(other),
        }
    }
}

impl From<f64> for SensorValue {
    fn from(value: f64) -> Self {
        SensorValue::Number(value)
    }
}

impl From<&str> for SensorValue {
    fn from(value: &str) -> Self {
        SensorValue::Text(value.to_string())
    }
}

impl From<String> for SensorValue {
    fn from(value: String) -> Self {
        SensorValue::Text(value)
    }
}

/// how the dashboard presents a sensor; decides which derived fields are kept
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Implementation {
    Gauge,
    /// keeps a bounded history
    Graph,
    Text,
    /// tracks the last transition time
    Boolean,
}

fn default_history() -> usize {
    100
}

/// immutable per-topic configuration, read from the `[[sensors]]` tables
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    /// unique routing key
    pub topic: String,
    pub name: String,
    /// free-form tag such as "temperature" or "door"
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub implementation: Implementation,
    /// history capacity (graph sensors only)
    #[serde(default = "default_history")]
    pub history: usize,
    #[serde(default, rename = "min")]
    pub min_value: Option<f64>,
    #[serde(default, rename = "max")]
    pub max_value: Option<f64>,
    /// display label when the transport value means "on"
    #[serde(default, rename = "true")]
    pub true_value: Option<String>,
    #[serde(default, rename = "false")]
    pub false_value: Option<String>,
    /// display unit; also the conversion target
    #[serde(default)]
    pub unit: Option<String>,
    /// unit the publisher reports in
    #[serde(default, rename = "inputUnit", alias = "input_unit")]
    pub input_unit: Option<String>,
    /// quantization step; non-positive disables
    #[serde(default)]
    pub precision: Option<f64>,
}

impl SensorDescriptor {
    /// descriptor with just the required fields; the rest default
    pub fn new(
        topic: impl Into<String>,
        name: impl Into<String>,
        sensor_type: impl Into<String>,
        implementation: Implementation,
    ) -> Self {
        Self {
            topic: topic.into(),
            name: name.into(),
            sensor_type: sensor_type.into(),
            implementation,
            history: default_history(),
            min_value: None,
            max_value: None,
            true_value: None,
            false_value: None,
            unit: None,
            input_unit: None,
            precision: None,
        }
    }

    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn with_labels(mut self, true_value: impl Into<String>, false_value: impl Into<String>) -> Self {
        self.true_value = Some(true_value.into());
        self.false_value = Some(false_value.into());
        self
    }

    /// `input` is what the publisher sends, `unit` what gets stored and shown
    pub fn with_units(mut self, input: Option<&str>, unit: Option<&str>) -> Self {
        self.input_unit = input.map(str::to_string);
        self.unit = unit.map(str::to_string);
        self
    }

    pub fn with_precision(mut self, step: f64) -> Self {
        self.precision = Some(step);
        self
    }
}

/// one retained sample of a graph sensor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub value: SensorValue,
    pub timestamp: DateTime<Utc>,
}

/// point-in-time copy of a sensor's state, safe to hand across threads
///
/// field names are the dashboard's wire shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub topic: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub implementation: Implementation,
    pub current_value: Option<SensorValue>,
    pub history: Vec<HistoryEntry>,
    pub last_updated: Option<DateTime<Utc>>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub true_value: Option<String>,
    pub false_value: Option<String>,
    pub last_switched: Option<DateTime<Utc>>,
    pub unit: Option<String>,
    pub input_unit: Option<String>,
    pub precision: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_value() {
        assert_eq!(SensorValue::from(json!(21.5)), SensorValue::Number(21.5));
        assert_eq!(SensorValue::from(json!(3)), SensorValue::Number(3.0));
        assert_eq!(SensorValue::from(json!("open")), SensorValue::Text("open".into()));
        assert_eq!(SensorValue::from(json!(true)), SensorValue::Structured(json!(true)));
        assert_eq!(
            SensorValue::from(json!({"a": 1})),
            SensorValue::Structured(json!({"a": 1}))
        );
    }

    #[test]
    fn test_as_number() {
        assert_eq!(SensorValue::Number(1.5).as_number(), Some(1.5));
        assert_eq!(SensorValue::from(" 19.343 ").as_number(), Some(19.343));
        assert_eq!(SensorValue::from("closed").as_number(), None);
        assert_eq!(SensorValue::from("NaN").as_number(), None);
        assert_eq!(SensorValue::from("inf").as_number(), None);
        assert_eq!(SensorValue::Structured(json!(true)).as_number(), None);
        assert_eq!(SensorValue::Structured(json!([1, 2])).as_number(), None);
    }

    #[test]
    fn test_value_serializes_untagged() {
        assert_eq!(serde_json::to_value(SensorValue::Number(2.5)).unwrap(), json!(2.5));
        assert_eq!(serde_json::to_value(SensorValue::from("on")).unwrap(), json!("on"));
        assert_eq!(
            serde_json::to_value(SensorValue::Structured(json!({"x": [1]}))).unwrap(),
            json!({"x": [1]})
        );
    }

    #[test]
    fn test_descriptor_config_spellings() {
        let d: SensorDescriptor = toml::from_str(
            r#"
            topic = "home/garage/door"
            name = "Garage"
            type = "door"
            implementation = "boolean"
            true = "open"
            false = "closed"
            "#,
        )
        .unwrap();
        assert_eq!(d.sensor_type, "door");
        assert_eq!(d.implementation, Implementation::Boolean);
        assert_eq!(d.history, 100);
        assert_eq!(d.true_value.as_deref(), Some("open"));
        assert_eq!(d.false_value.as_deref(), Some("closed"));

        let d: SensorDescriptor = toml::from_str(
            r#"
            topic = "t"
            name = "T"
            type = "temperature"
            implementation = "graph"
            history = 10
            min = -20.0
            max = 50.0
            unit = "°F"
            inputUnit = "°C"
            precision = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(d.history, 10);
        assert_eq!(d.min_value, Some(-20.0));
        assert_eq!(d.max_value, Some(50.0));
        assert_eq!(d.input_unit.as_deref(), Some("°C"));
        assert_eq!(d.unit.as_deref(), Some("°F"));
        assert_eq!(d.precision, Some(0.1));
    }

    #[test]
    fn test_unknown_implementation_rejected() {
        let res: Result<SensorDescriptor, _> = toml::from_str(
            r#"
            topic = "t"
            name = "T"
            type = "x"
            implementation = "sparkline"
            "#,
        );
        assert!(res.is_err());
    }
}
