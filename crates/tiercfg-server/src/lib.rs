//! Tiercfg RPC server
//!
//! Serves the engine over line-delimited JSON on stdin/stdout, one response
//! line per request line. Suitable for a forced-command SSH entry point or a
//! local sidecar process.

pub mod config;
pub mod handlers;
pub mod rpc;

pub use config::ServerConfig;
pub use rpc::RpcHandler;
