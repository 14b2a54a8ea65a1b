//! Server configuration.

use tiercfg_protocol::{PROTOCOL_MAX, PROTOCOL_MIN};

/// Server configuration settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Minimum supported protocol version.
    pub protocol_min: i32,
    /// Maximum supported protocol version.
    pub protocol_max: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            protocol_min: PROTOCOL_MIN,
            protocol_max: PROTOCOL_MAX,
        }
    }
}
