//! Effective configuration operation types.

use serde::{Deserialize, Serialize};

/// Get effective config request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEffectiveConfigRequest {
    pub node_id: String,
    /// Replace secret-like values with `[REDACTED]`.
    #[serde(default)]
    pub redact: bool,
}

/// Version of one contributing ancestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub node_id: String,
    pub version: u64,
}

/// Get effective config response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEffectiveConfigResponse {
    pub node_id: String,
    /// Merged document.
    pub config: serde_json::Value,
    /// Root first; changes whenever any contributing fragment changes.
    pub versions: Vec<VersionEntry>,
    /// Redacted key paths.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redactions: Vec<String>,
}

/// Explain request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainRequest {
    pub node_id: String,
    /// Dotted key path.
    pub path: String,
}

/// Value one ancestor sets at the explained path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub node_id: String,
    pub version: u64,
    pub value: serde_json::Value,
}

/// Explain response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub node_id: String,
    pub path: String,
    /// Effective value at the path, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Ancestors that set the path, root first.
    pub contributions: Vec<Contribution>,
    /// Node whose fragment decided the effective value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
}
