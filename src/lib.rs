//! Tiercfg - hierarchical configuration resolution
//!
//! Organizations, teams and sub-teams each own a configuration fragment.
//! The effective configuration of a node is the merge of every fragment on
//! its path from the org root, with restrictions that accumulate downward
//! and explicit overrides that lift them.
//!
//! - [`tree`]: the organization tree and its structure rules
//! - [`store`]: versioned fragments, audit history and the journal
//! - [`resolve`]: effective configuration, caching and provenance
//! - [`engine`]: the thread-safe facade over all of the above
//! - [`config`]: layered service configuration

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod resolve;
pub mod store;
pub mod tree;

pub use config::{ConfigError, LoadedConfig, ServiceConfig};
pub use engine::{Engine, EngineSettings};
pub use error::{EngineError, ErrorKind, Result};
pub use resolve::{EffectiveConfig, Explanation, VersionVector};
pub use store::{AuditEntry, ChangeRequest, ChangeType, ConfigRecord, Mutation};
pub use tree::{Node, NodeType};

pub use tiercfg_merge::{KeyPath, PermissionGate, Schema, Value};
