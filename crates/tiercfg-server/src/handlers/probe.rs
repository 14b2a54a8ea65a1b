//! Probe operation handler.
//!
//! Reports the service version, the protocol range and the merge shapes the
//! engine's schema pins. Always answered with protocol_version 0.

use tiercfg::Engine;
use tiercfg_merge::Shape;
use tiercfg_protocol::{ops::names, ops::ProbeResponse, SERVICE_VERSION};

use super::{to_payload, HandlerResult};
use crate::config::ServerConfig;

/// Handle the probe operation.
pub fn handle(config: &ServerConfig, engine: &Engine) -> HandlerResult {
    let schema = engine.schema();
    let response = ProbeResponse {
        service_version: SERVICE_VERSION.to_string(),
        protocol_min: config.protocol_min,
        protocol_max: config.protocol_max,
        operations: names::ALL.iter().map(|op| op.to_string()).collect(),
        keyed_collections: schema.patterns(Shape::KeyedCollection),
        flag_sets: schema.patterns(Shape::FlagSet),
    };
    to_payload(&response)
}
