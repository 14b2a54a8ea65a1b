//! Error types for the RPC protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned in RPC error responses.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed JSON, missing required fields, or invalid field values.
    InvalidRequest,
    /// Protocol version is outside the supported range.
    UnsupportedProtocol,
    /// Unknown operation requested.
    UnknownOperation,
    /// Unknown node, or no audit entry for the requested version.
    NotFound,
    /// A node with this id already exists in some org.
    AlreadyExists,
    /// Optimistic concurrency check failed; re-read and retry.
    VersionConflict,
    /// Fragment or patch is structurally invalid.
    SchemaViolation,
    /// Parent is missing, of the wrong type, or would form a cycle.
    InvalidParent,
    /// Node still has children and cascade was not requested.
    HasChildren,
    /// Store did not respond within its timeout; retry later.
    Unavailable,
    /// Persistent storage failed.
    Internal,
}

impl ErrorCode {
    /// Whether a caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict | Self::Unavailable)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::UnsupportedProtocol => write!(f, "UNSUPPORTED_PROTOCOL"),
            Self::UnknownOperation => write!(f, "UNKNOWN_OPERATION"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::AlreadyExists => write!(f, "ALREADY_EXISTS"),
            Self::VersionConflict => write!(f, "VERSION_CONFLICT"),
            Self::SchemaViolation => write!(f, "SCHEMA_VIOLATION"),
            Self::InvalidParent => write!(f, "INVALID_PARENT"),
            Self::HasChildren => write!(f, "HAS_CHILDREN"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// RPC error response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
    /// Whether the caller may retry.
    #[serde(default)]
    pub retryable: bool,
    /// Optional machine-readable details (node id, key path, versions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Create a new RPC error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
            data: None,
        }
    }

    /// Create a new RPC error with additional data.
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(code, message)
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create an UNSUPPORTED_PROTOCOL error.
    pub fn unsupported_protocol(version: i32, min: i32, max: i32) -> Self {
        Self::with_data(
            ErrorCode::UnsupportedProtocol,
            format!("protocol_version {} is outside supported range [{}, {}]", version, min, max),
            serde_json::json!({
                "requested": version,
                "min": min,
                "max": max
            }),
        )
    }

    /// Create an UNKNOWN_OPERATION error.
    pub fn unknown_operation(op: &str) -> Self {
        Self::with_data(
            ErrorCode::UnknownOperation,
            format!("unknown operation: {}", op),
            serde_json::json!({ "op": op }),
        )
    }

    /// Create a NOT_FOUND error for a node.
    pub fn node_not_found(node_id: &str) -> Self {
        Self::with_data(
            ErrorCode::NotFound,
            format!("node '{}' not found", node_id),
            serde_json::json!({ "node_id": node_id }),
        )
    }

    /// Create a NOT_FOUND error for a version of a node.
    pub fn version_not_found(node_id: &str, version: u64) -> Self {
        Self::with_data(
            ErrorCode::NotFound,
            format!("node '{}' has no audit entry for version {}", node_id, version),
            serde_json::json!({ "node_id": node_id, "version": version }),
        )
    }

    /// Create a VERSION_CONFLICT error.
    pub fn version_conflict(node_id: &str, expected: u64, actual: u64) -> Self {
        Self::with_data(
            ErrorCode::VersionConflict,
            format!(
                "node '{}' is at version {}, expected {}",
                node_id, actual, expected
            ),
            serde_json::json!({
                "node_id": node_id,
                "expected_version": expected,
                "actual_version": actual
            }),
        )
    }

    /// Create a SCHEMA_VIOLATION error.
    pub fn schema_violation(path: &str, reason: &str) -> Self {
        Self::with_data(
            ErrorCode::SchemaViolation,
            format!("schema violation at '{}': {}", path, reason),
            serde_json::json!({ "path": path, "reason": reason }),
        )
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_format() {
        let json = serde_json::to_value(ErrorCode::VersionConflict).unwrap();
        assert_eq!(json, "VERSION_CONFLICT");
        assert_eq!(ErrorCode::HasChildren.to_string(), "HAS_CHILDREN");
    }

    #[test]
    fn test_retryable_flag_follows_code() {
        assert!(RpcError::version_conflict("team-a", 1, 2).retryable);
        assert!(!RpcError::node_not_found("team-a").retryable);
        assert!(RpcError::new(ErrorCode::Unavailable, "timeout").retryable);
    }

    #[test]
    fn test_schema_violation_carries_path() {
        let err = RpcError::schema_violation("tools.x", "expected boolean, found string");
        assert_eq!(err.data.unwrap()["path"], "tools.x");
    }
}
