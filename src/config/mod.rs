//! Service configuration
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in defaults
//! 2. Host config (~/.config/tiercfg/config.toml)
//! 3. Explicit config file (--config)
//! 4. CLI flags

mod defaults;
mod service;

pub use defaults::{default_host_config_path, default_state_path};
pub use service::{
    CacheSettings, ConfigError, ConfigOrigin, ConfigSource, HistorySettings, LoadedConfig,
    LogSettings, RetrySettings, SchemaSettings, ServiceConfig, StoreSettings,
};
