//! Versioned fragment records and audit entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tiercfg_merge::{Change, Value};
use tiercfg_protocol::ops::{AuditEntryInfo, ChangeInfo, GetConfigResponse, PutConfigResponse};

pub use tiercfg_protocol::ops::ChangeType;

use crate::error::Result;

/// Attribution used when a caller does not name itself.
pub const ANONYMOUS: &str = "anonymous";

/// Immutable record of one committed version.
///
/// The full post-change snapshot is kept so any version can be restored
/// without replaying earlier entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub node_id: String,
    pub version: u64,
    pub change_type: ChangeType,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    /// SHA-256 over the canonical JSON form of `snapshot`
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_of: Option<u64>,
    pub snapshot: Value,
}

impl AuditEntry {
    pub fn to_info(&self) -> AuditEntryInfo {
        AuditEntryInfo {
            node_id: self.node_id.clone(),
            version: self.version,
            change_type: self.change_type,
            changed_by: self.changed_by.clone(),
            changed_at: self.changed_at,
            digest: self.digest.clone(),
            rollback_of: self.rollback_of,
            snapshot: self.snapshot.to_json(),
        }
    }

    pub fn to_put_response(&self) -> PutConfigResponse {
        PutConfigResponse {
            node_id: self.node_id.clone(),
            version: self.version,
            change_type: self.change_type,
            digest: self.digest.clone(),
        }
    }
}

/// Current fragment of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRecord {
    pub node_id: String,
    /// 0 until the first commit
    pub version: u64,
    pub fragment: Value,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl ConfigRecord {
    pub fn empty(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            version: 0,
            fragment: Value::empty(),
            updated_at: None,
            updated_by: None,
        }
    }

    pub fn from_entry(entry: &AuditEntry) -> Self {
        Self {
            node_id: entry.node_id.clone(),
            version: entry.version,
            fragment: entry.snapshot.clone(),
            updated_at: Some(entry.changed_at),
            updated_by: Some(entry.changed_by.clone()),
        }
    }

    pub fn to_response(&self) -> GetConfigResponse {
        GetConfigResponse {
            node_id: self.node_id.clone(),
            version: self.version,
            fragment: self.fragment.to_json(),
            updated_at: self.updated_at,
            updated_by: self.updated_by.clone(),
        }
    }
}

/// How a write derives the next fragment from the current one.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Merge into the current fragment with the resolution rules.
    Patch(Value),
    /// Substitute the whole fragment.
    Replace(Value),
    /// Restore the snapshot of an earlier version as a new version.
    Rollback { target_version: u64 },
}

impl Mutation {
    pub fn change_type(&self) -> ChangeType {
        match self {
            Self::Patch(_) => ChangeType::Patch,
            Self::Replace(_) => ChangeType::Replace,
            Self::Rollback { .. } => ChangeType::Rollback,
        }
    }
}

/// A write request against one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRequest {
    pub mutation: Mutation,
    /// Optimistic concurrency token; `None` skips the check.
    pub expected_version: Option<u64>,
    pub changed_by: String,
}

impl ChangeRequest {
    pub fn new(mutation: Mutation) -> Self {
        Self {
            mutation,
            expected_version: None,
            changed_by: ANONYMOUS.to_string(),
        }
    }

    pub fn patch(fragment: Value) -> Self {
        Self::new(Mutation::Patch(fragment))
    }

    pub fn replace(fragment: Value) -> Self {
        Self::new(Mutation::Replace(fragment))
    }

    pub fn rollback(target_version: u64) -> Self {
        Self::new(Mutation::Rollback { target_version })
    }

    pub fn expecting(mut self, version: Option<u64>) -> Self {
        self.expected_version = version;
        self
    }

    pub fn by(mut self, actor: Option<&str>) -> Self {
        if let Some(actor) = actor.filter(|a| !a.is_empty()) {
            self.changed_by = actor.to_string();
        }
        self
    }
}

/// Wire form of one diff entry.
pub fn change_info(change: &Change) -> ChangeInfo {
    ChangeInfo {
        path: change.path.to_string(),
        kind: change.kind.as_str().to_string(),
        before: change.before.as_ref().map(Value::to_json),
        after: change.after.as_ref().map(Value::to_json),
    }
}

/// Hex SHA-256 of the canonical (RFC 8785) JSON encoding of a snapshot.
pub fn snapshot_digest(snapshot: &Value) -> Result<String> {
    let canonical = serde_json_canonicalizer::to_vec(&snapshot.to_json())?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}
