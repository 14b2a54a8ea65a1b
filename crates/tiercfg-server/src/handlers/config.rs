//! Fragment handlers: get_config, put_config.
//!
//! `put_config` merges the payload into the node's fragment by default;
//! `merge: false` replaces the fragment outright.

use tiercfg::{ChangeRequest, Engine};
use tiercfg_protocol::{
    ops::{GetConfigRequest, PutConfigRequest},
    RpcRequest,
};

use super::{engine_error, fragment, to_payload, HandlerResult};

pub fn get(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: GetConfigRequest = request.parse_payload()?;
    let record = engine.current_fragment(&req.node_id).map_err(engine_error)?;
    to_payload(&record.to_response())
}

pub fn put(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: PutConfigRequest = request.parse_payload()?;
    let document = fragment(req.patch)?;
    let change = if req.merge {
        ChangeRequest::patch(document)
    } else {
        ChangeRequest::replace(document)
    };
    let change = change
        .expecting(req.expected_version)
        .by(req.changed_by.as_deref());

    let entry = engine.apply(&req.node_id, change).map_err(engine_error)?;
    to_payload(&entry.to_put_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tiercfg::{EngineSettings, NodeType, Schema};
    use tiercfg_protocol::{ops::names, ErrorCode};

    fn engine() -> Engine {
        let engine = Engine::in_memory(Schema::default(), EngineSettings::default());
        engine.create_node("acme", "acme", None, NodeType::Org).unwrap();
        engine
    }

    fn put_call(payload: serde_json::Value) -> RpcRequest {
        RpcRequest::new(names::PUT_CONFIG, "t", payload)
    }

    #[test]
    fn test_patch_then_replace() {
        let engine = engine();
        let first = put(&put_call(json!({"node_id": "acme", "patch": {"a": 1, "b": 2}})), &engine).unwrap();
        assert_eq!(first["version"], 1);
        assert_eq!(first["change_type"], "patch");

        put(&put_call(json!({"node_id": "acme", "patch": {"b": 3}})), &engine).unwrap();
        let current = get(&RpcRequest::new(names::GET_CONFIG, "t", json!({"node_id": "acme"})), &engine).unwrap();
        assert_eq!(current["fragment"], json!({"a": 1, "b": 3}));

        let replaced = put(
            &put_call(json!({"node_id": "acme", "patch": {"c": true}, "merge": false, "changed_by": "ops"})),
            &engine,
        )
        .unwrap();
        assert_eq!(replaced["version"], 3);
        assert_eq!(replaced["change_type"], "replace");

        let current = get(&RpcRequest::new(names::GET_CONFIG, "t", json!({"node_id": "acme"})), &engine).unwrap();
        assert_eq!(current["fragment"], json!({"c": true}));
        assert_eq!(current["updated_by"], "ops");
    }

    #[test]
    fn test_stale_expected_version() {
        let engine = engine();
        put(&put_call(json!({"node_id": "acme", "patch": {"a": 1}})), &engine).unwrap();
        let err = put(
            &put_call(json!({"node_id": "acme", "patch": {"a": 2}, "expected_version": 0})),
            &engine,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionConflict);
        assert!(err.retryable);
    }

    #[test]
    fn test_schema_violation() {
        let engine = engine();
        let err = put(
            &put_call(json!({"node_id": "acme", "patch": {"tools": {"web_search": "off"}}})),
            &engine,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaViolation);
    }

    #[test]
    fn test_unknown_node() {
        let err = get(&RpcRequest::new(names::GET_CONFIG, "t", json!({"node_id": "ghost"})), &engine()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
