//! Session boundary events
//!
//! Everything that crosses between the client core and the transport
//! collaborator. The JSON shape is `{"event": "<name>", "data": {...}}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A remote server address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Events delivered to the core by the transport
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    ServerConnected {
        host: String,
        port: u16,
    },
    ServerDisconnected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ServerMessage {
        text: String,
    },
    ConnectionError {
        error: String,
    },
    ConnectionLost {
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        port: Option<u16>,
    },
    CommandHistory {
        #[serde(default)]
        history: Vec<String>,
    },
}

impl InboundEvent {
    /// Parse one JSON-encoded event.
    ///
    /// `data` may be absent or `null` for events whose fields are all
    /// optional, e.g. `{"event":"server_disconnected"}`.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(object) = value.as_object_mut() {
            let data = object
                .entry("data")
                .or_insert(serde_json::Value::Null);
            if data.is_null() {
                *data = serde_json::Value::Object(serde_json::Map::new());
            }
        }
        serde_json::from_value(value)
    }
}

/// Intents emitted by the core for the transport to carry out
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundIntent {
    ConnectToServer {
        host: String,
        port: u16,
        auto_log: bool,
        log_filename: Option<String>,
    },
    DisconnectFromServer {},
    SendCommand {
        command: String,
    },
}

impl OutboundIntent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
