//! Response envelope.

use serde::{Deserialize, Serialize};
use crate::error::RpcError;

/// One response line per request line.
///
/// Exactly one of `payload` and `error` is present, matching `ok`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Echoed from the request; 0 for probe and for unparseable requests
    pub protocol_version: i32,
    pub request_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(protocol_version: i32, request_id: String, payload: serde_json::Value) -> Self {
        Self {
            protocol_version,
            request_id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn error(protocol_version: i32, request_id: String, error: RpcError) -> Self {
        Self {
            protocol_version,
            request_id,
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Wrap a handler outcome.
    pub fn from_result(
        protocol_version: i32,
        request_id: String,
        result: Result<serde_json::Value, RpcError>,
    ) -> Self {
        match result {
            Ok(payload) => Self::success(protocol_version, request_id, payload),
            Err(error) => Self::error(protocol_version, request_id, error),
        }
    }

    /// Whether the caller may re-read and resend.
    pub fn is_retryable(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn test_success_omits_error() {
        let response = RpcResponse::from_result(1, "r1".to_string(), Ok(serde_json::json!({"v": 1})));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], true);
        assert!(json.get("error").is_none());
        assert!(!response.is_retryable());
    }

    #[test]
    fn test_conflict_is_retryable() {
        let response = RpcResponse::from_result(
            1,
            "r2".to_string(),
            Err(RpcError::version_conflict("team-a", 2, 3)),
        );
        assert!(!response.ok);
        assert!(response.payload.is_none());
        assert_eq!(response.error.as_ref().unwrap().code, ErrorCode::VersionConflict);
        assert!(response.is_retryable());
    }
}
