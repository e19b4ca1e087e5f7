//! Settings types. Serialized as camelCase JSON; every field has a default
//! so partial files are valid.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusSettings {
    /// Network and transport settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Network and transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listening port.
    pub port: u16,
    /// Path of the WebSocket endpoint.
    pub ws_path: String,
    /// Interval between keepalive pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// Grace period for in-flight connections on shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50080,
            ws_path: "/".to_string(),
            heartbeat_interval_secs: 30,
            max_message_size: 16 * 1024 * 1024,
            shutdown_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 50080);
        assert_eq!(s.ws_path, "/");
        assert_eq!(s.heartbeat_interval_secs, 30);
        assert_eq!(s.max_message_size, 16 * 1024 * 1024);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(BusSettings::default()).unwrap();
        assert_eq!(json["server"]["wsPath"], "/");
        assert_eq!(json["server"]["maxMessageSize"], 16 * 1024 * 1024);
        assert_eq!(json["logging"]["format"], "compact");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: BusSettings = serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.ws_path, "/");
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn json_log_format_parses() {
        let s: LoggingSettings = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(s.format, LogFormat::Json);
    }
}
