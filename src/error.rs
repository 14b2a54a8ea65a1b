//! Engine errors.
//!
//! Every failure carries enough structure (node id, versions, key path) for
//! a caller to decide between retrying and aborting.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tiercfg_merge::SchemaViolation;
use tiercfg_protocol::{ErrorCode, RpcError};

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    VersionConflict,
    SchemaViolation,
    InvalidParent,
    HasChildren,
    InvalidRequest,
    Unavailable,
    Storage,
}

/// Errors from tree, store and resolver operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node '{node_id}' not found")]
    NodeNotFound { node_id: String },

    #[error("node '{node_id}' has no audit entry for version {version}")]
    VersionNotFound { node_id: String, version: u64 },

    #[error("node id '{node_id}' is already in use; ids are unique across all orgs")]
    AlreadyExists { node_id: String },

    #[error("node '{node_id}' is at version {actual}, expected {expected}")]
    VersionConflict {
        node_id: String,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    #[error("invalid parent for '{node_id}': {reason}")]
    InvalidParent { node_id: String, reason: String },

    #[error("node '{node_id}' has children: {}", .children.join(", "))]
    HasChildren {
        node_id: String,
        children: Vec<String>,
    },

    #[error("invalid node '{node_id}': {reason}")]
    InvalidNode { node_id: String, reason: String },

    #[error("timed out after {waited:?} waiting for {resource}")]
    Timeout { resource: String, waited: Duration },

    #[error("{resource} lock poisoned by a panicked writer")]
    Poisoned { resource: String },

    #[error("journal corrupt at line {line}: {reason}")]
    CorruptJournal { line: usize, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound { .. } | Self::VersionNotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::VersionConflict { .. } => ErrorKind::VersionConflict,
            Self::SchemaViolation(_) => ErrorKind::SchemaViolation,
            Self::InvalidParent { .. } => ErrorKind::InvalidParent,
            Self::HasChildren { .. } => ErrorKind::HasChildren,
            Self::InvalidNode { .. } => ErrorKind::InvalidRequest,
            Self::Timeout { .. } => ErrorKind::Unavailable,
            Self::Poisoned { .. }
            | Self::CorruptJournal { .. }
            | Self::Serialization(_)
            | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// Only optimistic-lock collisions and store timeouts are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::VersionConflict | ErrorKind::Unavailable
        )
    }

    pub(crate) fn node_not_found(node_id: &str) -> Self {
        Self::NodeNotFound {
            node_id: node_id.to_string(),
        }
    }

    pub(crate) fn invalid_parent(node_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParent {
            node_id: node_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Map onto the wire error registry.
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::NodeNotFound { node_id } => RpcError::node_not_found(node_id),
            Self::VersionNotFound { node_id, version } => {
                RpcError::version_not_found(node_id, *version)
            }
            Self::VersionConflict {
                node_id,
                expected,
                actual,
            } => RpcError::version_conflict(node_id, *expected, *actual),
            Self::SchemaViolation(v) => {
                RpcError::schema_violation(&v.path.to_string(), &v.reason.to_string())
            }
            Self::AlreadyExists { node_id } => RpcError::with_data(
                ErrorCode::AlreadyExists,
                self.to_string(),
                serde_json::json!({ "node_id": node_id }),
            ),
            Self::InvalidParent { node_id, .. } => RpcError::with_data(
                ErrorCode::InvalidParent,
                self.to_string(),
                serde_json::json!({ "node_id": node_id }),
            ),
            Self::HasChildren { node_id, children } => RpcError::with_data(
                ErrorCode::HasChildren,
                self.to_string(),
                serde_json::json!({ "node_id": node_id, "children": children }),
            ),
            Self::InvalidNode { node_id, .. } => RpcError::with_data(
                ErrorCode::InvalidRequest,
                self.to_string(),
                serde_json::json!({ "node_id": node_id }),
            ),
            Self::Timeout { .. } => RpcError::new(ErrorCode::Unavailable, self.to_string()),
            Self::Poisoned { .. }
            | Self::CorruptJournal { .. }
            | Self::Serialization(_)
            | Self::Io(_) => RpcError::new(ErrorCode::Internal, self.to_string()),
        }
    }
}
