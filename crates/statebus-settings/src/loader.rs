//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BusSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `STATEBUS_*` environment overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{BusSettings, LogFormat};

/// Resolve the default settings file path (`~/.statebus/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".statebus").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<BusSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<BusSettings> {
    let defaults = serde_json::to_value(BusSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `STATEBUS_*` environment overrides.
pub fn apply_env_overrides(settings: &mut BusSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Values that fail to parse or fall out of range are ignored with a warning
/// and the file/default value is kept.
pub fn apply_overrides_from<F>(settings: &mut BusSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("STATEBUS_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("STATEBUS_PORT") {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "STATEBUS_PORT", value = %v, "invalid port, ignoring"),
        }
    }
    if let Some(v) = read("STATEBUS_WS_PATH") {
        settings.server.ws_path = v;
    }
    if let Some(v) = read("STATEBUS_HEARTBEAT_INTERVAL") {
        match parse_u64_range(&v, 1, 3600) {
            Some(secs) => settings.server.heartbeat_interval_secs = secs,
            None => warn!(key = "STATEBUS_HEARTBEAT_INTERVAL", value = %v, "invalid interval, ignoring"),
        }
    }
    if let Some(v) = read("STATEBUS_MAX_MESSAGE_SIZE") {
        match parse_usize_range(&v, 1024, 1024 * 1024 * 1024) {
            Some(size) => settings.server.max_message_size = size,
            None => warn!(key = "STATEBUS_MAX_MESSAGE_SIZE", value = %v, "invalid size, ignoring"),
        }
    }
    if let Some(v) = read("STATEBUS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("STATEBUS_LOG_FORMAT") {
        match v.to_lowercase().as_str() {
            "compact" => settings.logging.format = LogFormat::Compact,
            "json" => settings.logging.format = LogFormat::Json,
            _ => warn!(key = "STATEBUS_LOG_FORMAT", value = %v, "unknown log format, ignoring"),
        }
    }
}

/// Reject settings the server cannot start with.
pub fn validate(settings: &BusSettings) -> Result<()> {
    if !settings.server.ws_path.starts_with('/') {
        return Err(SettingsError::InvalidValue(format!(
            "wsPath must start with '/', got {:?}",
            settings.server.ws_path
        )));
    }
    if settings.server.ws_path == "/health" {
        return Err(SettingsError::InvalidValue(
            "wsPath collides with the /health endpoint".to_string(),
        ));
    }
    if settings.server.heartbeat_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "heartbeatIntervalSecs must be positive".to_string(),
        ));
    }
    if settings.server.max_message_size == 0 {
        return Err(SettingsError::InvalidValue(
            "maxMessageSize must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
