//! Versioned fragment store
//!
//! Each node owns a slot holding its full audit history; the current fragment
//! is the snapshot of the last entry. Writers lock only their node's slot, so
//! writes to different nodes never contend.
//!
//! A write is: lock slot, check expected version, derive the new fragment,
//! validate it, append to the commit log, then publish in memory. Nothing is
//! visible to readers until the log append has succeeded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use tiercfg_merge::{MergeEngine, Value};

use super::journal::{CommitLog, JournalRecord};
use super::lock;
use super::record::{snapshot_digest, AuditEntry, ChangeRequest, ConfigRecord, Mutation};
use crate::error::{EngineError, Result};

/// Audit history of one node, oldest first.
#[derive(Debug, Default)]
struct NodeHistory {
    entries: Vec<AuditEntry>,
}

impl NodeHistory {
    fn version(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.version)
    }

    fn fragment(&self) -> Value {
        self.entries
            .last()
            .map_or_else(Value::empty, |e| e.snapshot.clone())
    }

    /// Versions are dense from 1, so lookup is by index.
    fn entry(&self, version: u64) -> Option<&AuditEntry> {
        let index = usize::try_from(version.checked_sub(1)?).ok()?;
        self.entries.get(index)
    }
}

type Slot = Arc<Mutex<NodeHistory>>;

/// Per-node fragments with optimistic concurrency and audit history.
#[derive(Debug)]
pub struct ConfigStore {
    slots: RwLock<HashMap<String, Slot>>,
    lock_timeout: Duration,
}

impl ConfigStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// Give a new node an empty fragment at version 0.
    pub fn register(&self, node_id: &str) -> Result<()> {
        let mut slots = lock::write(&self.slots, "store index", self.lock_timeout)?;
        slots.entry(node_id.to_string()).or_default();
        Ok(())
    }

    /// Forget nodes along with their history.
    pub fn unregister(&self, node_ids: &[String]) -> Result<()> {
        let mut slots = lock::write(&self.slots, "store index", self.lock_timeout)?;
        for id in node_ids {
            slots.remove(id);
        }
        Ok(())
    }

    fn slot(&self, node_id: &str) -> Result<Slot> {
        let slots = lock::read(&self.slots, "store index", self.lock_timeout)?;
        slots
            .get(node_id)
            .cloned()
            .ok_or_else(|| EngineError::node_not_found(node_id))
    }

    fn with_history<T>(&self, node_id: &str, f: impl FnOnce(&NodeHistory) -> T) -> Result<T> {
        let slot = self.slot(node_id)?;
        let history = lock::lock(&slot, &format!("node {}", node_id), self.lock_timeout)?;
        Ok(f(&history))
    }

    pub fn current(&self, node_id: &str) -> Result<ConfigRecord> {
        self.with_history(node_id, |history| match history.entries.last() {
            Some(entry) => ConfigRecord::from_entry(entry),
            None => ConfigRecord::empty(node_id),
        })
    }

    pub fn current_version(&self, node_id: &str) -> Result<u64> {
        self.with_history(node_id, NodeHistory::version)
    }

    /// Newest first, at most `limit` entries.
    pub fn history(&self, node_id: &str, limit: usize) -> Result<Vec<AuditEntry>> {
        self.with_history(node_id, |history| {
            history.entries.iter().rev().take(limit).cloned().collect()
        })
    }

    pub fn entry(&self, node_id: &str, version: u64) -> Result<AuditEntry> {
        self.with_history(node_id, |history| history.entry(version).cloned())?
            .ok_or_else(|| EngineError::VersionNotFound {
                node_id: node_id.to_string(),
                version,
            })
    }

    /// Snapshot at `version`; version 0 is the empty fragment.
    pub fn snapshot(&self, node_id: &str, version: u64) -> Result<Value> {
        if version == 0 {
            self.slot(node_id)?;
            return Ok(Value::empty());
        }
        Ok(self.entry(node_id, version)?.snapshot)
    }

    /// Commit one change and return its audit entry.
    pub fn apply(
        &self,
        node_id: &str,
        request: ChangeRequest,
        merge: &MergeEngine,
        log: &CommitLog,
    ) -> Result<AuditEntry> {
        let slot = self.slot(node_id)?;
        let mut history = lock::lock(&slot, &format!("node {}", node_id), self.lock_timeout)?;

        let actual = history.version();
        if let Some(expected) = request.expected_version {
            if expected != actual {
                tracing::debug!(node_id, expected, actual, "stale expected_version");
                return Err(EngineError::VersionConflict {
                    node_id: node_id.to_string(),
                    expected,
                    actual,
                });
            }
        }

        let change_type = request.mutation.change_type();
        let (snapshot, rollback_of) = match request.mutation {
            Mutation::Patch(patch) => {
                merge.schema().validate(&patch)?;
                let merged = merge.merge(history.fragment(), patch)?;
                merge.schema().validate(&merged)?;
                (merged, None)
            }
            Mutation::Replace(fragment) => {
                merge.schema().validate(&fragment)?;
                (fragment, None)
            }
            Mutation::Rollback { target_version } => {
                let target = history.entry(target_version).ok_or_else(|| {
                    EngineError::VersionNotFound {
                        node_id: node_id.to_string(),
                        version: target_version,
                    }
                })?;
                (target.snapshot.clone(), Some(target_version))
            }
        };

        let entry = AuditEntry {
            node_id: node_id.to_string(),
            version: actual + 1,
            change_type,
            changed_by: request.changed_by,
            changed_at: Utc::now(),
            digest: snapshot_digest(&snapshot)?,
            rollback_of,
            snapshot,
        };

        log.record(&JournalRecord::ConfigCommitted {
            entry: entry.clone(),
        })?;
        history.entries.push(entry.clone());
        Ok(entry)
    }

    /// Re-apply a journaled entry during replay.
    pub fn restore(&self, entry: AuditEntry) -> Result<()> {
        let slot = self.slot(&entry.node_id)?;
        let mut history = lock::lock(&slot, "replay", self.lock_timeout)?;
        let expected = history.version() + 1;
        if entry.version != expected {
            return Err(EngineError::VersionConflict {
                node_id: entry.node_id.clone(),
                expected,
                actual: entry.version,
            });
        }
        history.entries.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::record::ChangeType;
    use serde_json::json;

    fn value(json: serde_json::Value) -> Value {
        Value::from_json(json).unwrap()
    }

    fn store() -> (ConfigStore, MergeEngine, CommitLog) {
        let store = ConfigStore::new(Duration::from_millis(200));
        store.register("team-a").unwrap();
        (store, MergeEngine::default(), CommitLog::in_memory())
    }

    #[test]
    fn test_new_node_is_empty_at_version_zero() {
        let (store, _, _) = store();
        let record = store.current("team-a").unwrap();
        assert_eq!(record.version, 0);
        assert_eq!(record.fragment, Value::empty());
        assert!(store.history("team-a", 10).unwrap().is_empty());
    }

    #[test]
    fn test_patch_merges_and_increments() {
        let (store, merge, log) = store();
        store
            .apply("team-a", ChangeRequest::patch(value(json!({"a": 1, "m": {"x": 1}}))), &merge, &log)
            .unwrap();
        let entry = store
            .apply("team-a", ChangeRequest::patch(value(json!({"m": {"y": 2}}))), &merge, &log)
            .unwrap();

        assert_eq!(entry.version, 2);
        assert_eq!(entry.change_type, ChangeType::Patch);
        assert_eq!(
            store.current("team-a").unwrap().fragment.to_json(),
            json!({"a": 1, "m": {"x": 1, "y": 2}})
        );
    }

    #[test]
    fn test_replace_discards_previous() {
        let (store, merge, log) = store();
        store
            .apply("team-a", ChangeRequest::patch(value(json!({"a": 1}))), &merge, &log)
            .unwrap();
        store
            .apply("team-a", ChangeRequest::replace(value(json!({"b": 2}))), &merge, &log)
            .unwrap();
        assert_eq!(store.current("team-a").unwrap().fragment.to_json(), json!({"b": 2}));
    }

    #[test]
    fn test_stale_expected_version_rejected() {
        let (store, merge, log) = store();
        store
            .apply("team-a", ChangeRequest::patch(value(json!({"a": 1}))), &merge, &log)
            .unwrap();

        let err = store
            .apply(
                "team-a",
                ChangeRequest::patch(value(json!({"a": 2}))).expecting(Some(0)),
                &merge,
                &log,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::VersionConflict { expected: 0, actual: 1, .. }
        ));
        assert_eq!(store.current_version("team-a").unwrap(), 1);
    }

    #[test]
    fn test_invalid_patch_leaves_state_untouched() {
        let (store, merge, log) = store();
        let err = store
            .apply("team-a", ChangeRequest::patch(value(json!({"tools": {"x": "no"}}))), &merge, &log)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert_eq!(store.current_version("team-a").unwrap(), 0);
    }

    #[test]
    fn test_rollback_appends_new_version() {
        let (store, merge, log) = store();
        store
            .apply("team-a", ChangeRequest::patch(value(json!({"a": 1}))), &merge, &log)
            .unwrap();
        store
            .apply("team-a", ChangeRequest::patch(value(json!({"a": 2}))), &merge, &log)
            .unwrap();
        let entry = store
            .apply("team-a", ChangeRequest::rollback(1), &merge, &log)
            .unwrap();

        assert_eq!(entry.version, 3);
        assert_eq!(entry.rollback_of, Some(1));
        assert_eq!(store.current("team-a").unwrap().fragment.to_json(), json!({"a": 1}));
        assert_eq!(store.history("team-a", 10).unwrap().len(), 3);
    }

    #[test]
    fn test_rollback_to_unknown_version() {
        let (store, merge, log) = store();
        for target in [0, 7] {
            let err = store
                .apply("team-a", ChangeRequest::rollback(target), &merge, &log)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    #[test]
    fn test_history_newest_first_with_limit() {
        let (store, merge, log) = store();
        for i in 0..5 {
            store
                .apply("team-a", ChangeRequest::patch(value(json!({"i": i}))), &merge, &log)
                .unwrap();
        }
        let versions: Vec<u64> = store
            .history("team-a", 2)
            .unwrap()
            .iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(versions, vec![5, 4]);
    }

    #[test]
    fn test_unknown_node() {
        let (store, merge, log) = store();
        let err = store
            .apply("ghost", ChangeRequest::patch(Value::empty()), &merge, &log)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_restore_requires_next_version() {
        let (store, merge, log) = store();
        let entry = store
            .apply("team-a", ChangeRequest::patch(value(json!({"a": 1}))), &merge, &log)
            .unwrap();

        let other = ConfigStore::new(Duration::from_millis(50));
        other.register("team-a").unwrap();
        let mut skipped = entry.clone();
        skipped.version = 2;
        assert!(other.restore(skipped).is_err());
        other.restore(entry).unwrap();
        assert_eq!(other.current_version("team-a").unwrap(), 1);
    }
}
