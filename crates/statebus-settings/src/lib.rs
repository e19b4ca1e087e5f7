//! # statebus-settings
//!
//! Layered configuration for the state bus server.
//!
//! Settings are resolved from three layers (later wins):
//! 1. **Compiled defaults**: [`BusSettings::default()`]
//! 2. **Settings file**: `~/.statebus/settings.json` or an explicit path,
//!    deep-merged over the defaults
//! 3. **Environment variables**: `STATEBUS_*` overrides
//!
//! The binary applies command-line flags on top of the result. Settings are
//! passed explicitly to the server; there is no global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings_from_path, settings_path, validate,
};
pub use types::{BusSettings, LogFormat, LoggingSettings, ServerSettings};
