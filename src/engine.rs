//! Configuration engine
//!
//! Ties the node tree, the versioned store, the commit log and the resolver
//! together. Safe to share across threads behind an `Arc`.
//!
//! Lock order: node tree, then store index, then a node slot, then the
//! journal. Config writes hold the tree for reading so a node cannot be
//! deleted underneath an in-flight commit.

use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::Duration;

use tiercfg_merge::{diff, Change, KeyPath, MergeEngine, Schema, Value};

use crate::config::ServiceConfig;
use crate::error::{EngineError, Result};
use crate::resolve::{CacheStats, EffectiveConfig, Explanation, Resolver};
use crate::store::{
    lock, AuditEntry, ChangeRequest, CommitLog, ConfigRecord, ConfigStore, Journal, JournalRecord,
};
use crate::tree::{Node, NodeTree, NodeType};

/// Runtime knobs derived from the service configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub lock_timeout: Duration,
    pub retry_attempts: u32,
    pub history_default_limit: usize,
    pub history_max_limit: usize,
    pub cache_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2_000),
            retry_attempts: 5,
            history_default_limit: 50,
            history_max_limit: 1_000,
            cache_capacity: 1_024,
        }
    }
}

impl From<&ServiceConfig> for EngineSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            lock_timeout: Duration::from_millis(config.store.lock_timeout_ms),
            retry_attempts: config.retry.max_attempts,
            history_default_limit: config.history.default_limit,
            history_max_limit: config.history.max_limit,
            cache_capacity: config.cache.capacity,
        }
    }
}

/// Hierarchical configuration engine.
#[derive(Debug)]
pub struct Engine {
    tree: RwLock<NodeTree>,
    store: ConfigStore,
    resolver: Resolver,
    log: CommitLog,
    settings: EngineSettings,
}

impl Engine {
    fn build(schema: Schema, settings: EngineSettings, log: CommitLog) -> Self {
        Self {
            tree: RwLock::new(NodeTree::new()),
            store: ConfigStore::new(settings.lock_timeout),
            resolver: Resolver::new(MergeEngine::new(schema), settings.cache_capacity),
            log,
            settings,
        }
    }

    /// Engine without persistence.
    pub fn in_memory(schema: Schema, settings: EngineSettings) -> Self {
        Self::build(schema, settings, CommitLog::in_memory())
    }

    /// Open a journal-backed engine, replaying existing state.
    pub fn open(path: &Path, fsync: bool, schema: Schema, settings: EngineSettings) -> Result<Self> {
        let (journal, records) = Journal::open(path, fsync)?;
        let engine = Self::build(
            schema,
            settings.clone(),
            CommitLog::journaled(journal, settings.lock_timeout),
        );
        let count = records.len();
        engine.replay(records)?;
        tracing::info!(
            path = %path.display(),
            records = count,
            nodes = engine.tree_read()?.len(),
            "state restored from journal"
        );
        Ok(engine)
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let schema = Schema::from_lists(&config.schema.keyed_collections, &config.schema.flag_sets);
        let settings = EngineSettings::from(config);
        match &config.state_path {
            Some(path) => Self::open(path, config.store.fsync, schema, settings),
            None => {
                tracing::warn!("no state_path configured, state will not persist");
                Ok(Self::in_memory(schema, settings))
            }
        }
    }

    fn replay(&self, records: Vec<JournalRecord>) -> Result<()> {
        let mut tree = self.tree_write()?;
        for (index, record) in records.into_iter().enumerate() {
            let applied = match record {
                JournalRecord::NodeCreated { node } => {
                    let node_id = node.node_id.clone();
                    tree.insert(node)
                        .and_then(|()| self.store.register(&node_id))
                }
                JournalRecord::NodesDeleted { node_ids } => {
                    tree.remove(&node_ids);
                    self.store.unregister(&node_ids)
                }
                JournalRecord::ConfigCommitted { entry } => self.store.restore(entry),
            };
            applied.map_err(|e| EngineError::CorruptJournal {
                line: index + 1,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn tree_read(&self) -> Result<RwLockReadGuard<'_, NodeTree>> {
        lock::read(&self.tree, "node tree", self.settings.lock_timeout)
    }

    fn tree_write(&self) -> Result<RwLockWriteGuard<'_, NodeTree>> {
        lock::write(&self.tree, "node tree", self.settings.lock_timeout)
    }

    pub fn schema(&self) -> &Schema {
        self.resolver.merge_engine().schema()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn is_durable(&self) -> bool {
        self.log.is_durable()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache().stats()
    }

    // ---------------------------------------------------------------------
    // Node tree
    // ---------------------------------------------------------------------

    pub fn create_node(
        &self,
        org_id: &str,
        node_id: &str,
        parent_id: Option<&str>,
        node_type: NodeType,
    ) -> Result<Node> {
        let node = Node::new(org_id, node_id, parent_id.map(str::to_string), node_type);

        let mut tree = self.tree_write()?;
        tree.check_insert(&node)?;
        self.log.record(&JournalRecord::NodeCreated { node: node.clone() })?;
        tree.insert(node.clone())?;
        self.store.register(node_id)?;

        tracing::info!(org_id, node_id, node_type = %node_type, "node created");
        Ok(node)
    }

    /// Delete a node (and with `cascade`, its subtree). Returns removed ids,
    /// leaves first.
    pub fn delete_node(&self, node_id: &str, cascade: bool) -> Result<Vec<String>> {
        let mut tree = self.tree_write()?;
        let removed = tree.removal_set(node_id, cascade)?;
        self.log.record(&JournalRecord::NodesDeleted {
            node_ids: removed.clone(),
        })?;
        tree.remove(&removed);
        self.store.unregister(&removed)?;
        self.resolver.cache().invalidate(&removed);

        tracing::info!(node_id, removed = removed.len(), "node deleted");
        Ok(removed)
    }

    pub fn node(&self, node_id: &str) -> Result<Node> {
        Ok(self.tree_read()?.get(node_id)?.clone())
    }

    pub fn list_nodes(&self, org_id: Option<&str>) -> Result<Vec<Node>> {
        Ok(self.tree_read()?.list(org_id).into_iter().cloned().collect())
    }

    /// Path from the org root to `node_id`, inclusive.
    pub fn ancestry(&self, node_id: &str) -> Result<Vec<Node>> {
        Ok(self
            .tree_read()?
            .ancestry(node_id)?
            .into_iter()
            .cloned()
            .collect())
    }

    // ---------------------------------------------------------------------
    // Fragments
    // ---------------------------------------------------------------------

    pub fn current_fragment(&self, node_id: &str) -> Result<ConfigRecord> {
        let _tree = self.tree_read()?;
        self.store.current(node_id)
    }

    /// Commit a change to one node.
    pub fn apply(&self, node_id: &str, request: ChangeRequest) -> Result<AuditEntry> {
        let _tree = self.tree_read()?;
        let entry = self
            .store
            .apply(node_id, request, self.resolver.merge_engine(), &self.log)?;
        tracing::info!(
            node_id,
            version = entry.version,
            change_type = %entry.change_type,
            changed_by = %entry.changed_by,
            "config committed"
        );
        Ok(entry)
    }

    pub fn patch_config(
        &self,
        node_id: &str,
        patch: Value,
        expected_version: Option<u64>,
        changed_by: Option<&str>,
    ) -> Result<AuditEntry> {
        self.apply(
            node_id,
            ChangeRequest::patch(patch)
                .expecting(expected_version)
                .by(changed_by),
        )
    }

    pub fn replace_config(
        &self,
        node_id: &str,
        fragment: Value,
        expected_version: Option<u64>,
        changed_by: Option<&str>,
    ) -> Result<AuditEntry> {
        self.apply(
            node_id,
            ChangeRequest::replace(fragment)
                .expecting(expected_version)
                .by(changed_by),
        )
    }

    /// Restore the snapshot of `target_version` as a new version.
    pub fn rollback(
        &self,
        node_id: &str,
        target_version: u64,
        expected_version: Option<u64>,
        changed_by: Option<&str>,
    ) -> Result<AuditEntry> {
        self.apply(
            node_id,
            ChangeRequest::rollback(target_version)
                .expecting(expected_version)
                .by(changed_by),
        )
    }

    /// Patch against the version just read, retrying on conflicts and
    /// timeouts up to the configured attempt limit.
    pub fn patch_with_retry(
        &self,
        node_id: &str,
        patch: Value,
        changed_by: Option<&str>,
    ) -> Result<AuditEntry> {
        self.update_with_retry(node_id, changed_by, |_| Ok(ChangeRequest::patch(patch.clone())))
    }

    /// Read-modify-write loop: `prepare` builds a request from the current
    /// record; the commit is checked against the version it saw.
    pub fn update_with_retry<F>(
        &self,
        node_id: &str,
        changed_by: Option<&str>,
        mut prepare: F,
    ) -> Result<AuditEntry>
    where
        F: FnMut(&ConfigRecord) -> Result<ChangeRequest>,
    {
        let max_attempts = self.settings.retry_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.current_fragment(node_id)?;
            let request = prepare(&current)?
                .expecting(Some(current.version))
                .by(changed_by);

            match self.apply(node_id, request) {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::debug!(node_id, attempt, error = %e, "retrying config write");
                    thread::sleep(backoff(attempt));
                }
                result => return result,
            }
        }
    }

    // ---------------------------------------------------------------------
    // Audit log
    // ---------------------------------------------------------------------

    /// Newest first; `limit` defaults and is capped per settings.
    pub fn history(&self, node_id: &str, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
        let limit = limit
            .unwrap_or(self.settings.history_default_limit)
            .min(self.settings.history_max_limit);
        let _tree = self.tree_read()?;
        self.store.history(node_id, limit)
    }

    pub fn version(&self, node_id: &str, version: u64) -> Result<AuditEntry> {
        let _tree = self.tree_read()?;
        self.store.entry(node_id, version)
    }

    /// Changes from snapshot `from` to snapshot `to`; version 0 is the empty
    /// fragment.
    pub fn diff_versions(&self, node_id: &str, from: u64, to: u64) -> Result<Vec<Change>> {
        let _tree = self.tree_read()?;
        let old = self.store.snapshot(node_id, from)?;
        let new = self.store.snapshot(node_id, to)?;
        Ok(diff(&old, &new))
    }

    // ---------------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------------

    fn chain(&self, tree: &NodeTree, node_id: &str) -> Result<Vec<ConfigRecord>> {
        tree.ancestry(node_id)?
            .iter()
            .map(|node| self.store.current(&node.node_id))
            .collect()
    }

    /// Merge the current fragments along the ancestry of `node_id`.
    ///
    /// The tree read guard is held until the result is cached, so a delete
    /// cannot invalidate in between and leave a stale entry behind.
    pub fn resolve(&self, node_id: &str) -> Result<EffectiveConfig> {
        let tree = self.tree_read()?;
        let chain = self.chain(&tree, node_id)?;
        let effective = self.resolver.resolve(node_id, &chain)?;
        drop(tree);
        tracing::debug!(node_id, depth = chain.len(), "resolved effective config");
        Ok(effective)
    }

    /// Which ancestors set `path`, and the value that resulted.
    pub fn explain(&self, node_id: &str, path: &KeyPath) -> Result<Explanation> {
        let tree = self.tree_read()?;
        let chain = self.chain(&tree, node_id)?;
        self.resolver.explain(node_id, &chain, path)
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis((1u64 << attempt.min(6)).min(50))
}
