//! Structural differences between two snapshots.
//!
//! Mappings are compared key by key. Sequences and scalars are compared as
//! whole values, matching how they merge.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::path::KeyPath;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub path: KeyPath,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

/// Changes that turn `old` into `new`, ordered by path.
pub fn diff(old: &Value, new: &Value) -> Vec<Change> {
    let mut changes = Vec::new();
    diff_at(&mut KeyPath::root(), old, new, &mut changes);
    changes
}

fn diff_at(path: &mut KeyPath, old: &Value, new: &Value, changes: &mut Vec<Change>) {
    match (old, new) {
        (Value::Mapping(old_map), Value::Mapping(new_map)) => {
            let keys: BTreeSet<&String> = old_map.keys().chain(new_map.keys()).collect();
            for key in keys {
                path.push(key.as_str());
                match (old_map.get(key), new_map.get(key)) {
                    (Some(before), Some(after)) => diff_at(path, before, after, changes),
                    (Some(before), None) => changes.push(Change {
                        path: path.clone(),
                        kind: ChangeKind::Removed,
                        before: Some(before.clone()),
                        after: None,
                    }),
                    (None, Some(after)) => changes.push(Change {
                        path: path.clone(),
                        kind: ChangeKind::Added,
                        before: None,
                        after: Some(after.clone()),
                    }),
                    (None, None) => {}
                }
                path.pop();
            }
        }
        (old, new) if old != new => changes.push(Change {
            path: path.clone(),
            kind: ChangeKind::Modified,
            before: Some(old.clone()),
            after: Some(new.clone()),
        }),
        _ => {}
    }
}
