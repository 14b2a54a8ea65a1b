//! Tiercfg Protocol Types
//!
//! Defines the line-delimited JSON RPC envelope spoken between callers and
//! the configuration service.

pub mod error;
pub mod request;
pub mod response;
pub mod ops;

pub use error::{ErrorCode, RpcError};
pub use request::RpcRequest;
pub use response::RpcResponse;

/// Protocol version used for probe requests (sentinel value).
pub const PROTOCOL_VERSION_PROBE: i32 = 0;

/// Minimum protocol version supported by this implementation.
pub const PROTOCOL_MIN: i32 = 1;

/// Maximum protocol version supported by this implementation.
pub const PROTOCOL_MAX: i32 = 1;

/// Current service version string.
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
