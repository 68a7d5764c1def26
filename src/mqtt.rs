//! ==============================================================================
//! mqtt.rs - message bus ingestion
//! ==============================================================================
//!
//! purpose:
//!     keeps an MQTT session open to the broker, subscribes to the registered
//!     sensor topics and hands every publish to a callback as (topic, value).
//!
//! relationships:
//!     - used by: main.rs (spawned as a background task)
//!     - feeds: dispatcher.rs (callback is UpdateDispatcher::ingest)
//!
//! payloads:
//!     bytes -> utf-8 -> json if it parses, raw text otherwise.
//!     "21.5" arrives as a number, "open" as text, {"a":1} as structured.
//!
//! ==============================================================================

use crate::config::MqttConfig;
use crate::domain::SensorValue;
use crate::error::Result;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;

/// capacity of the client request channel
const REQUEST_CAPACITY: usize = 64;

/// decode a publish payload into a sensor value
///
/// `None` for payloads that are not valid utf-8.
pub fn decode_payload(payload: &[u8]) -> Option<SensorValue> {
    let text = std::str::from_utf8(payload).ok()?;
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => Some(SensorValue::from(value)),
        Err(_) => Some(SensorValue::Text(text.to_string())),
    }
}

/// mqtt subscriber for a fixed topic set
pub struct MqttIngest {
    config: MqttConfig,
    topics: Vec<String>,
}

impl MqttIngest {
    pub fn new(config: MqttConfig, topics: Vec<String>) -> Self {
        Self { config, topics }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs));
        if let Some((user, pass)) = self.config.credentials() {
            options.set_credentials(user, pass);
        }
        options
    }

    /// connect and pump the event loop forever
    ///
    /// connection errors are logged and retried after the configured delay.
    pub async fn run<F>(self, on_message: F)
    where
        F: Fn(&str, SensorValue) + Send + Sync + 'static,
    {
        tracing::info!(host = %self.config.host, port = self.config.port, "Connecting to MQTT broker");
        let (client, eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);
        let retry = Duration::from_secs(self.config.reconnect_delay_secs.max(1));
        pump(client, eventloop, self.topics, retry, on_message).await
    }
}

async fn pump<F>(client: AsyncClient, mut eventloop: EventLoop, topics: Vec<String>, retry: Duration, on_message: F)
where
    F: Fn(&str, SensorValue) + Send + Sync + 'static,
{
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    tracing::info!("Connected to MQTT broker");
                    // subscribe off the poll loop so the request channel keeps draining
                    let client = client.clone();
                    let topics = topics.clone();
                    tokio::spawn(async move {
                        if let Err(e) = subscribe_all(&client, &topics).await {
                            tracing::error!(error = %e, "Failed to subscribe to sensor topics");
                        }
                    });
                } else {
                    tracing::error!(code = ?ack.code, "MQTT broker refused connection");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => match decode_payload(&publish.payload) {
                Some(value) => {
                    tracing::debug!(topic = %publish.topic, value = ?value, "Received message");
                    on_message(publish.topic.as_str(), value);
                }
                None => {
                    tracing::warn!(topic = %publish.topic, "Dropping message with non utf-8 payload");
                }
            },
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::warn!("Disconnected from MQTT broker");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, retry_secs = retry.as_secs(), "MQTT connection error");
                tokio::time::sleep(retry).await;
            }
        }
    }
}

async fn subscribe_all(client: &AsyncClient, topics: &[String]) -> Result<()> {
    for topic in topics {
        client.subscribe(topic.as_str(), QoS::AtMostOnce).await?;
        tracing::info!(topic = %topic, "Subscribed to topic");
    }
    Ok(())
}
