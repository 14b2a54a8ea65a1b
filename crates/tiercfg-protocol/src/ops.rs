//! Operation-specific types.

pub mod audit;
pub mod config;
pub mod effective;
pub mod node;
pub mod probe;

pub use audit::{
    AuditEntryInfo, ChangeInfo, DiffVersionsRequest, DiffVersionsResponse, GetVersionRequest,
    ListHistoryRequest, ListHistoryResponse, RollbackRequest,
};
pub use config::{ChangeType, GetConfigRequest, GetConfigResponse, PutConfigRequest, PutConfigResponse};
pub use effective::{
    Contribution, ExplainRequest, ExplainResponse, GetEffectiveConfigRequest,
    GetEffectiveConfigResponse, VersionEntry,
};
pub use node::{
    AncestryRequest, AncestryResponse, CreateNodeRequest, DeleteNodeRequest, DeleteNodeResponse,
    NodeInfo, NodeType,
};
pub use probe::ProbeResponse;

/// Known operation names.
pub mod names {
    pub const PROBE: &str = "probe";
    pub const CREATE_NODE: &str = "create_node";
    pub const DELETE_NODE: &str = "delete_node";
    pub const GET_ANCESTRY: &str = "get_ancestry";
    pub const GET_CONFIG: &str = "get_config";
    pub const PUT_CONFIG: &str = "put_config";
    pub const GET_EFFECTIVE_CONFIG: &str = "get_effective_config";
    pub const EXPLAIN: &str = "explain";
    pub const LIST_HISTORY: &str = "list_history";
    pub const GET_VERSION: &str = "get_version";
    pub const DIFF_VERSIONS: &str = "diff_versions";
    pub const ROLLBACK: &str = "rollback";

    /// Every operation, in the order advertised by probe.
    pub const ALL: &[&str] = &[
        PROBE,
        CREATE_NODE,
        DELETE_NODE,
        GET_ANCESTRY,
        GET_CONFIG,
        PUT_CONFIG,
        GET_EFFECTIVE_CONFIG,
        EXPLAIN,
        LIST_HISTORY,
        GET_VERSION,
        DIFF_VERSIONS,
        ROLLBACK,
    ];
}
