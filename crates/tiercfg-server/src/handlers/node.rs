//! Node tree handlers: create_node, delete_node, get_ancestry.

use tiercfg::Engine;
use tiercfg_protocol::{
    ops::{AncestryRequest, AncestryResponse, CreateNodeRequest, DeleteNodeRequest, DeleteNodeResponse},
    RpcRequest,
};

use super::{engine_error, to_payload, HandlerResult};

pub fn create(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: CreateNodeRequest = request.parse_payload()?;
    let node = engine
        .create_node(&req.org_id, &req.node_id, req.parent_id.as_deref(), req.node_type)
        .map_err(engine_error)?;
    to_payload(&node.to_info())
}

pub fn delete(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: DeleteNodeRequest = request.parse_payload()?;
    let deleted = engine
        .delete_node(&req.node_id, req.cascade)
        .map_err(engine_error)?;
    to_payload(&DeleteNodeResponse { deleted })
}

pub fn ancestry(request: &RpcRequest, engine: &Engine) -> HandlerResult {
    let req: AncestryRequest = request.parse_payload()?;
    let path = engine.ancestry(&req.node_id).map_err(engine_error)?;
    to_payload(&AncestryResponse {
        path: path.iter().map(|n| n.to_info()).collect(),
    })
}
