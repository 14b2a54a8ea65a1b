//! Effective configuration cache
//!
//! Entries are keyed by node and the version vector of its ancestry, so any
//! ancestor write produces a vector that no cached entry matches. Deleting a
//! node also drops every entry whose vector mentions it: a recreated node
//! restarts at version 0 and could otherwise alias a stale vector.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tiercfg_merge::Value;

use super::VersionVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

#[derive(Debug)]
struct CachedConfig {
    versions: VersionVector,
    document: Arc<Value>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CachedConfig>,
    /// Insertion order for eviction
    order: VecDeque<String>,
}

/// Bounded FIFO cache of merged documents.
#[derive(Debug)]
pub struct EffectiveCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EffectiveCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A poisoned cache only costs recomputation, so it reads as empty.
    fn inner(&self) -> Option<MutexGuard<'_, CacheInner>> {
        self.inner.lock().ok()
    }

    pub fn get(&self, node_id: &str, versions: &VersionVector) -> Option<Arc<Value>> {
        let hit = self.inner().and_then(|inner| {
            inner
                .entries
                .get(node_id)
                .filter(|cached| &cached.versions == versions)
                .map(|cached| Arc::clone(&cached.document))
        });
        let counter = if hit.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    pub fn insert(&self, node_id: &str, versions: VersionVector, document: Arc<Value>) {
        if self.capacity == 0 {
            return;
        }
        let Some(mut inner) = self.inner() else {
            return;
        };

        if !inner.entries.contains_key(node_id) {
            while inner.entries.len() >= self.capacity {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
            }
            inner.order.push_back(node_id.to_string());
        }
        inner
            .entries
            .insert(node_id.to_string(), CachedConfig { versions, document });
    }

    /// Drop entries for these nodes and for every node that inherits from them.
    pub fn invalidate(&self, node_ids: &[String]) {
        let Some(mut inner) = self.inner() else {
            return;
        };
        inner.entries.retain(|_, cached| {
            !node_ids.iter().any(|id| cached.versions.contains(id))
        });
        let CacheInner { entries, order } = &mut *inner;
        order.retain(|id| entries.contains_key(id));
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner().map_or(0, |inner| inner.entries.len()),
            capacity: self.capacity,
        }
    }
}
