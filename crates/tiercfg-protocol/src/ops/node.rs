//! Node tree operation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Level of a node in the organization tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Org,
    Team,
    Subteam,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Org => "org",
            Self::Team => "team",
            Self::Subteam => "subteam",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "org" | "organization" => Ok(Self::Org),
            "team" => Ok(Self::Team),
            "subteam" | "sub-team" | "sub_team" => Ok(Self::Subteam),
            other => Err(format!("unknown node type '{}' (expected org, team, subteam)", other)),
        }
    }
}

/// A node as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub org_id: String,
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub node_type: NodeType,
    pub created_at: DateTime<Utc>,
}

/// Create node request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    pub org_id: String,
    pub node_id: String,
    /// Absent only for organization roots.
    #[serde(default)]
    pub parent_id: Option<String>,
    pub node_type: NodeType,
}

/// Delete node request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNodeRequest {
    pub node_id: String,
    /// Delete descendants too instead of failing with HAS_CHILDREN.
    #[serde(default)]
    pub cascade: bool,
}

/// Delete node response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNodeResponse {
    /// Removed node ids, leaves first.
    pub deleted: Vec<String>,
}

/// Ancestry request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestryRequest {
    pub node_id: String,
}

/// Ancestry response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestryResponse {
    /// Root first, requested node last.
    pub path: Vec<NodeInfo>,
}
