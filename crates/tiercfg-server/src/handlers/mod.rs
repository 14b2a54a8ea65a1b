//! Operation handlers for the RPC server.
//!
//! Each handler parses its payload, calls the engine and returns the
//! serialized response payload.

pub mod audit;
pub mod config;
pub mod effective;
pub mod node;
pub mod probe;

use serde::Serialize;
use tiercfg::{EngineError, Value};
use tiercfg_protocol::RpcError;

pub(crate) type HandlerResult = Result<serde_json::Value, RpcError>;

pub(crate) fn to_payload<T: Serialize>(response: &T) -> HandlerResult {
    serde_json::to_value(response)
        .map_err(|e| RpcError::invalid_request(format!("failed to serialize response: {}", e)))
}

pub(crate) fn engine_error(err: EngineError) -> RpcError {
    err.to_rpc_error()
}

/// Convert a payload document into a fragment.
pub(crate) fn fragment(json: serde_json::Value) -> Result<Value, RpcError> {
    Value::from_json(json).map_err(|e| engine_error(EngineError::from(e)))
}
