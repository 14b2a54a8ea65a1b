//! Versioned configuration storage
//!
//! - `record`: audit entries, current records and write requests
//! - `config_store`: per-node versioned fragments
//! - `journal`: JSON-lines persistence of every state transition
//! - `lock`: lock acquisition with deadlines

pub mod config_store;
pub mod journal;
pub mod lock;
pub mod record;

pub use config_store::ConfigStore;
pub use journal::{CommitLog, Journal, JournalRecord};
pub use record::{
    change_info, snapshot_digest, AuditEntry, ChangeRequest, ChangeType, ConfigRecord, Mutation,
    ANONYMOUS,
};
