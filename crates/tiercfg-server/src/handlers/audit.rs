//! History handlers: list_history, get_version, diff_versions, rollback.

use tiercfg::{store::change_info, AuditEntry, Engine};
use tiercfg_protocol::{
    ops::{
        DiffVersionsRequest, DiffVersionsResponse, GetVersionRequest, ListHistoryRequest,
        ListHistoryResponse, RollbackRequest,
    },
    RpcRequest,
};

use super::{engine_error, to_payload, HandlerResult};

pub fn list_history(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: ListHistoryRequest = request.parse_payload()?;
    let entries = engine.history(&req.node_id, req.limit).map_err(engine_error)?;
    to_payload(&ListHistoryResponse {
        node_id: req.node_id,
        entries: entries.iter().map(AuditEntry::to_info).collect(),
    })
}

pub fn get_version(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: GetVersionRequest = request.parse_payload()?;
    let entry = engine.version(&req.node_id, req.version).map_err(engine_error)?;
    to_payload(&entry.to_info())
}

pub fn diff_versions(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: DiffVersionsRequest = request.parse_payload()?;
    let changes = engine
        .diff_versions(&req.node_id, req.from, req.to)
        .map_err(engine_error)?;
    to_payload(&DiffVersionsResponse {
        node_id: req.node_id,
        from: req.from,
        to: req.to,
        changes: changes.iter().map(change_info).collect(),
    })
}

pub fn rollback(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: RollbackRequest = request.parse_payload()?;
    let entry = engine
        .rollback(
            &req.node_id,
            req.version,
            req.expected_version,
            req.changed_by.as_deref(),
        )
        .map_err(engine_error)?;
    to_payload(&entry.to_put_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tiercfg::{EngineSettings, NodeType, Schema, Value};
    use tiercfg_protocol::{ops::names, ErrorCode};

    fn engine() -> Engine {
        let engine = Engine::in_memory(Schema::default(), EngineSettings::default());
        engine.create_node("acme", "acme", None, NodeType::Org).unwrap();
        for fragment in [json!({"a": 1}), json!({"a": 2, "b": true})] {
            engine
                .patch_config("acme", Value::from_json(fragment).unwrap(), None, Some("alice"))
                .unwrap();
        }
        engine
    }

    fn call(op: &str, payload: serde_json::Value) -> RpcRequest {
        RpcRequest::new(op, "t", payload)
    }

    #[test]
    fn test_history_newest_first() {
        let payload = list_history(&call(names::LIST_HISTORY, json!({"node_id": "acme"})), &engine()).unwrap();
        let entries = payload["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["version"], 2);
        assert_eq!(entries[0]["changed_by"], "alice");
        assert_eq!(entries[1]["snapshot"], json!({"a": 1}));
    }

    #[test]
    fn test_get_version_and_missing_version() {
        let engine = engine();
        let payload = get_version(&call(names::GET_VERSION, json!({"node_id": "acme", "version": 1})), &engine).unwrap();
        assert_eq!(payload["snapshot"], json!({"a": 1}));

        let err = get_version(&call(names::GET_VERSION, json!({"node_id": "acme", "version": 9})), &engine).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_diff_versions() {
        let payload = diff_versions(
            &call(names::DIFF_VERSIONS, json!({"node_id": "acme", "from": 1, "to": 2})),
            &engine(),
        )
        .unwrap();
        let changes = payload["changes"].as_array().unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().any(|c| c["path"] == "a" && c["before"] == 1 && c["after"] == 2));
        assert!(changes.iter().any(|c| c["path"] == "b" && c["kind"] == "added"));
    }

    #[test]
    fn test_rollback_appends_version() {
        let engine = engine();
        let payload = rollback(
            &call(names::ROLLBACK, json!({"node_id": "acme", "version": 1, "expected_version": 2})),
            &engine,
        )
        .unwrap();
        assert_eq!(payload["version"], 3);
        assert_eq!(payload["change_type"], "rollback");

        let latest = get_version(&call(names::GET_VERSION, json!({"node_id": "acme", "version": 3})), &engine).unwrap();
        assert_eq!(latest["rollback_of"], 1);
        assert_eq!(latest["snapshot"], json!({"a": 1}));
    }
}
