//! Audit and rollback operation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::ChangeType;

/// List history request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListHistoryRequest {
    pub node_id: String,
    /// Maximum entries to return (service default when absent).
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One audit entry on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntryInfo {
    pub node_id: String,
    pub version: u64,
    pub change_type: ChangeType,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    /// SHA-256 of the canonical JSON of the snapshot.
    pub digest: String,
    /// Version restored by a rollback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_of: Option<u64>,
    /// Full fragment at this version.
    pub snapshot: serde_json::Value,
}

/// List history response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListHistoryResponse {
    pub node_id: String,
    /// Newest first.
    pub entries: Vec<AuditEntryInfo>,
}

/// Get version request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetVersionRequest {
    pub node_id: String,
    pub version: u64,
}

/// Diff versions request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffVersionsRequest {
    pub node_id: String,
    pub from: u64,
    pub to: u64,
}

/// One changed path between two versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeInfo {
    pub path: String,
    /// added, removed or modified.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
}

/// Diff versions response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffVersionsResponse {
    pub node_id: String,
    pub from: u64,
    pub to: u64,
    pub changes: Vec<ChangeInfo>,
}

/// Rollback request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub node_id: String,
    /// Version whose snapshot becomes current again.
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<String>,
}
