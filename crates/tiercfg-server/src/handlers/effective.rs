//! Resolution handlers: get_effective_config, explain.

use tiercfg::{Engine, KeyPath};
use tiercfg_protocol::{
    ops::{ExplainRequest, GetEffectiveConfigRequest},
    RpcError, RpcRequest,
};

use super::{engine_error, to_payload, HandlerResult};

pub fn get(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: GetEffectiveConfigRequest = request.parse_payload()?;
    let effective = engine.resolve(&req.node_id).map_err(engine_error)?;
    to_payload(&effective.to_response(req.redact))
}

pub fn explain(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: ExplainRequest = request.parse_payload()?;
    let path = KeyPath::parse(&req.path);
    if path.is_root() {
        return Err(RpcError::invalid_request("explain requires a non-empty key path"));
    }
    let explanation = engine.explain(&req.node_id, &path).map_err(engine_error)?;
    to_payload(&explanation.to_response())
}
