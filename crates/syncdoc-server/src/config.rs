//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use syncdoc_settings::SyncSettings;

/// Per-session sizing and gating.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capacity of each session's outbound queue (minimum 1).
    pub outbound_capacity: usize,
    /// Content capacity of each subscription sink (minimum 1).
    pub sink_capacity: usize,
    /// Path every new session is subscribed to when it exists.
    pub system_path: String,
    /// Only act on envelopes whose `source` is `"client"`.
    pub require_client_source: bool,
    /// Interval between transport keepalives.
    pub ping_interval_secs: u64,
}

impl SessionConfig {
    /// Keepalive interval as a `Duration` (at least one second).
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 1,
            sink_capacity: 1,
            system_path: "system".into(),
            require_client_source: true,
            ping_interval_secs: 30,
        }
    }
}

/// Configuration for the syncdoc server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max WebSocket frame / REST body size in bytes.
    pub max_message_size: usize,
    /// Session behavior.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 16 * 1024 * 1024,
            session: SessionConfig::default(),
        }
    }
}

impl From<&SyncSettings> for ServerConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_message_size: settings.server.max_message_size,
            session: SessionConfig {
                outbound_capacity: settings.session.outbound_capacity,
                sink_capacity: settings.session.sink_capacity,
                system_path: settings.session.system_path.clone(),
                require_client_source: settings.session.require_client_source,
                ping_interval_secs: settings.server.ping_interval_secs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.max_message_size, 16 * 1024 * 1024);
        assert_eq!(cfg.session.outbound_capacity, 1);
        assert_eq!(cfg.session.system_path, "system");
        assert_eq!(cfg.session.ping_interval(), Duration::from_secs(30));
    }

    #[test]
    fn from_settings() {
        let mut settings = SyncSettings::default();
        settings.server.port = 9000;
        settings.server.ping_interval_secs = 5;
        settings.session.sink_capacity = 3;
        settings.session.require_client_source = false;
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.session.sink_capacity, 3);
        assert!(!cfg.session.require_client_source);
        assert_eq!(cfg.session.ping_interval(), Duration::from_secs(5));
    }

    #[test]
    fn zero_ping_interval_is_clamped() {
        let cfg = SessionConfig {
            ping_interval_secs: 0,
            ..SessionConfig::default()
        };
        assert_eq!(cfg.ping_interval(), Duration::from_secs(1));
    }
}
