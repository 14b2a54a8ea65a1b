//! RPC request types.

use serde::{Deserialize, Serialize};

/// RPC request envelope.
///
/// Each request is a single JSON object on its own line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version (selected by the caller after probe).
    /// For probe requests, this MUST be 0.
    pub protocol_version: i32,
    /// Operation name.
    pub op: String,
    /// Caller-chosen request ID for correlation.
    pub request_id: String,
    /// Operation-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RpcRequest {
    /// Build a request with the current protocol version.
    pub fn new(op: impl Into<String>, request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_MAX,
            op: op.into(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Deserialize the payload into an operation request type.
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::RpcError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            crate::RpcError::invalid_request(format!("invalid {} request: {}", self.op, e))
        })
    }
}
