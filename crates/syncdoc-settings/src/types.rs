//! Settings type definitions.
//!
//! All types use camelCase field names and `#[serde(default)]`, so a partial
//! settings file only needs to name the values it changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Network listener settings.
    pub server: ServerSettings,
    /// Per-session queue sizing and message gating.
    pub session: SessionSettings,
    /// Documents created at startup.
    pub documents: DocumentSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl SyncSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.session.outbound_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "session.outboundCapacity must be at least 1".into(),
            ));
        }
        if self.session.sink_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "session.sinkCapacity must be at least 1".into(),
            ));
        }
        if self.server.ping_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.pingIntervalSecs must be at least 1".into(),
            ));
        }
        if self.server.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageSize must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port; `0` picks an ephemeral port.
    pub port: u16,
    /// Largest accepted WebSocket frame or REST body, in bytes.
    pub max_message_size: usize,
    /// Interval between WebSocket pings.
    pub ping_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_message_size: 16 * 1024 * 1024,
            ping_interval_secs: 30,
        }
    }
}

/// Session settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Capacity of each session's outbound queue.
    pub outbound_capacity: usize,
    /// Content capacity of each subscription sink.
    pub sink_capacity: usize,
    /// Path every new session is subscribed to when it exists.
    pub system_path: String,
    /// Only act on envelopes whose `source` is `"client"`.
    pub require_client_source: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 1,
            sink_capacity: 1,
            system_path: "system".to_string(),
            require_client_source: true,
        }
    }
}

/// Startup documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentSettings {
    /// Path → initial value.
    pub seed: BTreeMap<String, Value>,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        let mut seed = BTreeMap::new();
        let _ = seed.insert("default".to_string(), json!({"messages": [], "users": []}));
        let _ = seed.insert("system".to_string(), Value::Null);
        Self { seed }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
