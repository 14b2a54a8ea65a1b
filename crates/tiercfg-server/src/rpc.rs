//! RPC handler
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout until EOF:
//!
//!   tiercfg-server rpc
//!
//! A malformed line gets an INVALID_REQUEST response with protocol_version 0
//! and the session continues.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tiercfg::Engine;
use tiercfg_protocol::{
    ops::names, RpcError, RpcRequest, RpcResponse, PROTOCOL_VERSION_PROBE,
};

use crate::config::ServerConfig;
use crate::handlers;

/// Main RPC handler for the server.
pub struct RpcHandler {
    config: ServerConfig,
    engine: Arc<Engine>,
}

impl RpcHandler {
    pub fn new(config: ServerConfig, engine: Arc<Engine>) -> Self {
        Self { config, engine }
    }

    /// Serve stdin/stdout until EOF.
    pub fn run(&self) -> io::Result<()> {
        self.run_with_io(&mut io::stdin().lock(), &mut io::stdout().lock())
    }

    /// Serve custom I/O (for testing).
    pub fn run_with_io<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> io::Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }
            let response = self.handle_line(&line);
            self.write_response(writer, &response)?;
        }
    }

    /// Handle a single request line.
    pub fn handle_line(&self, line: &str) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                return RpcResponse::error(
                    PROTOCOL_VERSION_PROBE,
                    String::new(),
                    RpcError::invalid_request(format!("invalid JSON: {}", e)),
                )
            }
        };

        if let Err(e) = self.validate_protocol_version(&request) {
            return RpcResponse::error(request.protocol_version, request.request_id.clone(), e);
        }

        self.dispatch(&request)
    }

    /// Validate the protocol version in the request.
    fn validate_protocol_version(&self, request: &RpcRequest) -> Result<(), RpcError> {
        // probe requests MUST use protocol_version: 0
        if request.op == names::PROBE {
            if request.protocol_version != PROTOCOL_VERSION_PROBE {
                return Err(RpcError::unsupported_protocol(
                    request.protocol_version,
                    PROTOCOL_VERSION_PROBE,
                    PROTOCOL_VERSION_PROBE,
                ));
            }
            return Ok(());
        }

        if request.protocol_version < self.config.protocol_min
            || request.protocol_version > self.config.protocol_max
        {
            return Err(RpcError::unsupported_protocol(
                request.protocol_version,
                self.config.protocol_min,
                self.config.protocol_max,
            ));
        }

        Ok(())
    }

    fn dispatch(&self, request: &RpcRequest) -> RpcResponse {
        let protocol_version = if request.op == names::PROBE {
            PROTOCOL_VERSION_PROBE
        } else {
            request.protocol_version
        };

        let engine = self.engine.as_ref();
        let result = match request.op.as_str() {
            names::PROBE => handlers::probe::handle(&self.config, engine),
            names::CREATE_NODE => handlers::node::create(request, engine),
            names::DELETE_NODE => handlers::node::delete(request, engine),
            names::GET_ANCESTRY => handlers::node::ancestry(request, engine),
            names::GET_CONFIG => handlers::config::get(request, engine),
            names::PUT_CONFIG => handlers::config::put(request, engine),
            names::GET_EFFECTIVE_CONFIG => handlers::effective::get(request, engine),
            names::EXPLAIN => handlers::effective::explain(request, engine),
            names::LIST_HISTORY => handlers::audit::list_history(request, engine),
            names::GET_VERSION => handlers::audit::get_version(request, engine),
            names::DIFF_VERSIONS => handlers::audit::diff_versions(request, engine),
            names::ROLLBACK => handlers::audit::rollback(request, engine),
            _ => Err(RpcError::unknown_operation(&request.op)),
        };

        if let Err(e) = &result {
            tracing::debug!(
                op = %request.op,
                request_id = %request.request_id,
                code = %e.code,
                "request failed"
            );
        }
        RpcResponse::from_result(protocol_version, request.request_id.clone(), result)
    }

    fn write_response<W: Write>(&self, writer: &mut W, response: &RpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }
}
