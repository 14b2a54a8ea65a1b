//! Layered service configuration with provenance
//!
//! Layers are deep-merged with the same rules used for node fragments, so a
//! table in a later layer refines an earlier one key by key, a list replaces
//! it, and an explicit empty value (`state_path = ""`) can be used to clear a
//! default.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tiercfg_merge::{MergeEngine, Schema, Value};

use super::defaults::default_host_config_path;

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    File,
    Cli,
}

/// A contributing layer with provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Journal location; `None` keeps all state in memory
    #[serde(deserialize_with = "empty_path_as_none")]
    pub state_path: Option<PathBuf>,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
    pub history: HistorySettings,
    pub log: LogSettings,
    pub schema: SchemaSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Upper bound on waiting for any store lock
    pub lock_timeout_ms: u64,
    /// Sync the journal after every append
    pub fsync: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing` filter directive, e.g. `info` or `tiercfg=debug`
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Path patterns merged by entry id
    pub keyed_collections: Vec<String>,
    /// Path patterns whose entries must be booleans
    pub flag_sets: Vec<String>,
}

fn empty_path_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path: Option<PathBuf> = Option::deserialize(deserializer)?;
    Ok(path.filter(|p| !p.as_os_str().is_empty()))
}

/// Merged configuration plus the layers it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedConfig {
    pub config: ServiceConfig,
    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
    pub loaded_at: DateTime<Utc>,
}

impl ServiceConfig {
    pub fn schema(&self) -> Schema {
        Schema::from_lists(&self.schema.keyed_collections, &self.schema.flag_sets)
    }

    /// Load builtin defaults, the host file, an explicit file and CLI
    /// overrides, in that order of precedence.
    ///
    /// A missing host file is skipped; a missing explicit file is an error.
    pub fn load(
        host_config_path: Option<&Path>,
        config_path: Option<&Path>,
        cli_overrides: Option<serde_json::Value>,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        let defaults = serde_json::to_value(ServiceConfig::default())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        layers.push(defaults);
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        // Layer 2: Host config
        if let Some(path) = host_config_path {
            if path.exists() {
                let (value, digest) = load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::Host,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        // Layer 3: Explicit config file
        if let Some(path) = config_path {
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        // Layer 4: CLI overrides
        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers)?;
        let config: ServiceConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        config.validate()?;

        Ok(LoadedConfig {
            config,
            sources,
            loaded_at: Utc::now(),
        })
    }

    /// Load with the default host path.
    pub fn load_default(
        config_path: Option<&Path>,
        cli_overrides: Option<serde_json::Value>,
    ) -> Result<LoadedConfig, ConfigError> {
        let host = default_host_config_path();
        Self::load(host.as_deref(), config_path, cli_overrides)
    }

    /// Check value bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // lock_timeout_ms must be in (0, 60000]
        if self.store.lock_timeout_ms == 0 || self.store.lock_timeout_ms > 60_000 {
            return Err(ConfigError::ValidationError(
                "store.lock_timeout_ms must be in (0, 60000]".to_string(),
            ));
        }

        // max_attempts must be in [1, 100]
        if !(1..=100).contains(&self.retry.max_attempts) {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be in [1, 100]".to_string(),
            ));
        }

        // default_limit must be in (0, max_limit]
        if self.history.default_limit == 0 || self.history.default_limit > self.history.max_limit
        {
            return Err(ConfigError::ValidationError(format!(
                "history.default_limit must be in (0, {}]",
                self.history.max_limit
            )));
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be greater than 0".to_string(),
            ));
        }

        let patterns = self
            .schema
            .keyed_collections
            .iter()
            .chain(&self.schema.flag_sets);
        for pattern in patterns {
            if pattern.is_empty() || pattern.split('.').any(str::is_empty) {
                return Err(ConfigError::ValidationError(format!(
                    "schema pattern '{}' has an empty segment",
                    pattern
                )));
            }
        }

        Ok(())
    }
}

impl LoadedConfig {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Deep-merge JSON layers, later layers winning.
fn merge_layers(layers: Vec<serde_json::Value>) -> Result<serde_json::Value, ConfigError> {
    let values = layers
        .into_iter()
        .map(Value::from_json)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    MergeEngine::new(Schema::empty())
        .merge_all(values)
        .map(|merged| merged.to_json())
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
}

/// Load and parse a TOML file, returning the value and digest
fn load_toml_file(path: &Path) -> Result<(serde_json::Value, String), ConfigError> {
    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

    let toml_value: toml::Value = toml::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

    Ok((toml_to_json(toml_value), digest))
}

/// Convert TOML Value to JSON Value
fn toml_to_json(toml: toml::Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match toml {
        toml::Value::String(s) => Json::String(s),
        toml::Value::Integer(i) => Json::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        toml::Value::Boolean(b) => Json::Bool(b),
        toml::Value::Datetime(dt) => Json::String(dt.to_string()),
        toml::Value::Array(arr) => Json::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Json::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
