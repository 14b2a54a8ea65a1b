//! Probe operation types.
//!
//! Lets a caller discover protocol range and supported operations.

use serde::{Deserialize, Serialize};

/// Probe response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Service version string.
    pub service_version: String,
    /// Minimum supported protocol version.
    pub protocol_min: i32,
    /// Maximum supported protocol version.
    pub protocol_max: i32,
    /// Operations this service answers.
    pub operations: Vec<String>,
    /// Paths merged as keyed collections.
    pub keyed_collections: Vec<String>,
    /// Paths validated as flag sets.
    pub flag_sets: Vec<String>,
}
