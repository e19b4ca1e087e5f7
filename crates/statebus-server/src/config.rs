//! Server configuration.

use std::time::Duration;

use statebus_settings::ServerSettings;

/// Runtime configuration for [`BusServer`](crate::server::BusServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Path of the WebSocket endpoint.
    pub ws_path: String,
    /// Interval between keepalive pings.
    pub heartbeat_interval: Duration,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for the server task to drain.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_path: "/".into(),
            heartbeat_interval: Duration::from_secs(30),
            max_message_size: 16 * 1024 * 1024,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            ws_path: settings.ws_path.clone(),
            heartbeat_interval: Duration::from_secs(settings.heartbeat_interval_secs.max(1)),
            max_message_size: settings.max_message_size,
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_loopback_on_any_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.ws_path, "/");
    }

    #[test]
    fn from_settings_copies_every_field() {
        let settings = ServerSettings {
            host: "0.0.0.0".into(),
            port: 9000,
            ws_path: "/bus".into(),
            heartbeat_interval_secs: 7,
            max_message_size: 4096,
            shutdown_timeout_secs: 2,
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.ws_path, "/bus");
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(7));
        assert_eq!(cfg.max_message_size, 4096);
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(2));
    }

    #[test]
    fn settings_defaults_match_server_defaults_except_bind() {
        let cfg = ServerConfig::from(&ServerSettings::default());
        let defaults = ServerConfig::default();
        assert_eq!(cfg.port, 50080);
        assert_eq!(cfg.heartbeat_interval, defaults.heartbeat_interval);
        assert_eq!(cfg.max_message_size, defaults.max_message_size);
    }

    #[test]
    fn zero_heartbeat_is_clamped_to_one_second() {
        let settings = ServerSettings {
            heartbeat_interval_secs: 0,
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(1));
    }
}
