//! Fragment read/write operation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a version came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Patch,
    Replace,
    Rollback,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Patch => "patch",
            Self::Replace => "replace",
            Self::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// Get config request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetConfigRequest {
    pub node_id: String,
}

/// Get config response payload: the node's own fragment, unmerged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetConfigResponse {
    pub node_id: String,
    /// 0 for a node that was never configured.
    pub version: u64,
    pub fragment: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// Put config request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutConfigRequest {
    pub node_id: String,
    /// Fragment to merge (merge=true) or the full replacement (merge=false).
    pub patch: serde_json::Value,
    #[serde(default = "default_merge")]
    pub merge: bool,
    /// Fail with VERSION_CONFLICT unless the node is at this version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<String>,
}

fn default_merge() -> bool {
    true
}

/// Response to any mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutConfigResponse {
    pub node_id: String,
    /// Newly allocated version.
    pub version: u64,
    pub change_type: ChangeType,
    /// SHA-256 of the canonical JSON of the new fragment.
    pub digest: String,
}
