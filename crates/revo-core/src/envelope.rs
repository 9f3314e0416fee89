//! Wire envelope shared by both directions of the real-time transport.
//!
//! One envelope per text frame:
//!
//! ```json
//! {"type": "agent_status_update", "channel": "agents", "payload": {...},
//!  "timestamp": "2025-01-01T00:00:00Z", "id": "0193..."}
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::MessageId;

/// Subscription key that receives every inbound message.
pub const WILDCARD: &str = "*";

/// Well-known values of the envelope `type` field.
pub mod kinds {
    /// Heartbeat sent by the client while connected.
    pub const PING: &str = "ping";
    /// Heartbeat reply (not checked by the client).
    pub const PONG: &str = "pong";
    /// Client request to join a set of channels.
    pub const SUBSCRIBE: &str = "subscribe";
    /// Client request to leave a set of channels.
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    /// Server push: an agent changed status.
    pub const AGENT_STATUS_UPDATE: &str = "agent_status_update";
    /// Server push: periodic system metrics.
    pub const METRICS_UPDATE: &str = "metrics_update";
    /// Server push: error report.
    pub const ERROR: &str = "error";
}

/// Typed message envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind, e.g. `"ping"` or `"agent_status_update"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional routing key for pub/sub dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub payload: Value,
    /// Creation time; defaults to receive time when the server omits it.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Optional correlation ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
}

impl Envelope {
    /// Build an outbound envelope stamped with the current time and a fresh ID.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            channel: None,
            payload,
            timestamp: Utc::now(),
            id: Some(MessageId::new()),
        }
    }

    /// Set the routing channel.
    #[must_use]
    pub fn on_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Heartbeat envelope.
    pub fn ping() -> Self {
        Self::new(kinds::PING, Value::Object(serde_json::Map::new()))
    }

    /// Channel join request for the given channel names.
    pub fn subscribe<S: AsRef<str>>(channels: &[S]) -> Self {
        let channels: Vec<&str> = channels.iter().map(AsRef::as_ref).collect();
        Self::new(kinds::SUBSCRIBE, serde_json::json!({ "channels": channels }))
    }

    /// Keys this envelope is routed under: its channel (if any), then its
    /// type when that differs from the channel.
    pub fn routing_keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(2);
        if let Some(channel) = self.channel.as_deref() {
            keys.push(channel);
        }
        if self.channel.as_deref() != Some(self.kind.as_str()) {
            keys.push(self.kind.as_str());
        }
        keys
    }

    /// Whether this is a heartbeat (`ping`/`pong`) frame.
    pub fn is_heartbeat(&self) -> bool {
        self.kind == kinds::PING || self.kind == kinds::PONG
    }

    /// Decode the payload into a concrete type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Serialize to a single JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
