//! Built-in service defaults (layer 1)

use std::env;
use std::path::PathBuf;

use tiercfg_merge::schema::{DEFAULT_FLAG_SETS, DEFAULT_KEYED_COLLECTIONS};

use super::service::{
    CacheSettings, HistorySettings, LogSettings, RetrySettings, SchemaSettings, ServiceConfig,
    StoreSettings,
};

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_CACHE_CAPACITY: usize = 1_024;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 1_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `~/.local/state/tiercfg/journal.jsonl`, or `None` without a home dir.
pub fn default_state_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".local/state/tiercfg/journal.jsonl"))
}

/// `~/.config/tiercfg/config.toml`
pub fn default_host_config_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".config/tiercfg/config.toml"))
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            store: StoreSettings::default(),
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
            history: HistorySettings::default(),
            log: LogSettings::default(),
            schema: SchemaSettings::default(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            fsync: true,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_HISTORY_LIMIT,
            max_limit: MAX_HISTORY_LIMIT,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            keyed_collections: DEFAULT_KEYED_COLLECTIONS.iter().map(|s| s.to_string()).collect(),
            flag_sets: DEFAULT_FLAG_SETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.store.lock_timeout_ms, 2_000);
        assert!(config.store.fsync);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.history.default_limit, 50);
        assert_eq!(config.schema.keyed_collections, vec!["mcp_servers", "integrations"]);
        assert_eq!(config.schema.flag_sets, vec!["tools", "agents.*.tools"]);
    }

    #[test]
    fn test_to_value() {
        let value = serde_json::to_value(ServiceConfig::default()).unwrap();
        assert_eq!(value["cache"]["capacity"], 1_024);
        assert_eq!(value["log"]["level"], "info");
    }
}
