//! Organization tree
//!
//! Nodes form a forest of organization roots with teams and sub-teams
//! beneath them. Structure rules enforced on insert:
//! - org nodes are roots and have no parent
//! - a team's parent is an org
//! - a sub-team's parent is a team or another sub-team
//! - a child belongs to the same org as its parent
//! - no node is its own ancestor
//! - depth is bounded
//!
//! Traversals are iterative and bounded by [`MAX_TREE_DEPTH`].

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tiercfg_protocol::ops::NodeInfo;

pub use tiercfg_protocol::ops::NodeType;

use crate::error::{EngineError, Result};

/// Maximum number of nodes on a root-to-leaf path.
pub const MAX_TREE_DEPTH: usize = 32;

/// A node in the organization tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub org_id: String,
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub node_type: NodeType,
    pub created_at: DateTime<Utc>,
}

impl Node {
    pub fn new(
        org_id: impl Into<String>,
        node_id: impl Into<String>,
        parent_id: Option<String>,
        node_type: NodeType,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            node_id: node_id.into(),
            parent_id,
            node_type,
            created_at: Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn to_info(&self) -> NodeInfo {
        NodeInfo {
            org_id: self.org_id.clone(),
            node_id: self.node_id.clone(),
            parent_id: self.parent_id.clone(),
            node_type: self.node_type,
            created_at: self.created_at,
        }
    }
}

/// Parent/child index over all nodes.
#[derive(Debug, Default)]
pub struct NodeTree {
    nodes: HashMap<String, Node>,
    children: HashMap<String, BTreeSet<String>>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn get(&self, node_id: &str) -> Result<&Node> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| EngineError::node_not_found(node_id))
    }

    /// Direct children, sorted by id.
    pub fn children(&self, node_id: &str) -> Vec<String> {
        self.children
            .get(node_id)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Nodes sorted by (org, id), optionally restricted to one org.
    pub fn list(&self, org_id: Option<&str>) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| org_id.map_or(true, |org| n.org_id == org))
            .collect();
        nodes.sort_by(|a, b| (&a.org_id, &a.node_id).cmp(&(&b.org_id, &b.node_id)));
        nodes
    }

    /// Path from the org root down to `node_id`, inclusive.
    pub fn ancestry(&self, node_id: &str) -> Result<Vec<&Node>> {
        let mut path = Vec::new();
        let mut current = Some(self.get(node_id)?);

        while let Some(node) = current {
            if path.len() == MAX_TREE_DEPTH {
                return Err(EngineError::invalid_parent(
                    node_id,
                    format!("ancestry exceeds {} levels", MAX_TREE_DEPTH),
                ));
            }
            path.push(node);
            current = match &node.parent_id {
                Some(parent_id) => Some(self.get(parent_id)?),
                None => None,
            };
        }

        path.reverse();
        Ok(path)
    }

    /// Check every structure rule for a node about to be inserted.
    pub fn check_insert(&self, node: &Node) -> Result<()> {
        if node.node_id.trim().is_empty() {
            return Err(EngineError::InvalidNode {
                node_id: node.node_id.clone(),
                reason: "node_id must not be empty".to_string(),
            });
        }
        if node.org_id.trim().is_empty() {
            return Err(EngineError::InvalidNode {
                node_id: node.node_id.clone(),
                reason: "org_id must not be empty".to_string(),
            });
        }
        if self.contains(&node.node_id) {
            return Err(EngineError::AlreadyExists {
                node_id: node.node_id.clone(),
            });
        }

        let parent_id = match (&node.parent_id, node.node_type) {
            (None, NodeType::Org) => return Ok(()),
            (Some(_), NodeType::Org) => {
                return Err(EngineError::invalid_parent(
                    &node.node_id,
                    "org nodes are roots and cannot have a parent",
                ))
            }
            (None, node_type) => {
                return Err(EngineError::invalid_parent(
                    &node.node_id,
                    format!("{} nodes require a parent", node_type),
                ))
            }
            (Some(parent_id), _) => parent_id,
        };

        if parent_id == &node.node_id {
            return Err(EngineError::invalid_parent(
                &node.node_id,
                "a node cannot be its own parent",
            ));
        }

        let parent = self.nodes.get(parent_id).ok_or_else(|| {
            EngineError::invalid_parent(
                &node.node_id,
                format!("parent '{}' does not exist", parent_id),
            )
        })?;

        let allowed = match node.node_type {
            NodeType::Team => parent.node_type == NodeType::Org,
            NodeType::Subteam => {
                matches!(parent.node_type, NodeType::Team | NodeType::Subteam)
            }
            NodeType::Org => false,
        };
        if !allowed {
            return Err(EngineError::invalid_parent(
                &node.node_id,
                format!(
                    "a {} cannot be placed under {} '{}'",
                    node.node_type, parent.node_type, parent.node_id
                ),
            ));
        }

        if parent.org_id != node.org_id {
            return Err(EngineError::invalid_parent(
                &node.node_id,
                format!(
                    "parent '{}' belongs to org '{}', not '{}'",
                    parent.node_id, parent.org_id, node.org_id
                ),
            ));
        }

        // New ids never appear in an existing chain, so only depth can fail here.
        let parent_path = self.ancestry(parent_id)?;
        if parent_path.len() + 1 > MAX_TREE_DEPTH {
            return Err(EngineError::invalid_parent(
                &node.node_id,
                format!("tree depth would exceed {} levels", MAX_TREE_DEPTH),
            ));
        }

        Ok(())
    }

    /// Validate and add a node.
    pub fn insert(&mut self, node: Node) -> Result<()> {
        self.check_insert(&node)?;
        if let Some(parent_id) = &node.parent_id {
            self.children
                .entry(parent_id.clone())
                .or_default()
                .insert(node.node_id.clone());
        }
        self.nodes.insert(node.node_id.clone(), node);
        Ok(())
    }

    /// Ids that deleting `node_id` removes, leaves first and `node_id` last.
    ///
    /// Without `cascade` a node with children yields `HasChildren`.
    pub fn removal_set(&self, node_id: &str, cascade: bool) -> Result<Vec<String>> {
        self.get(node_id)?;
        let direct = self.children(node_id);
        if !cascade && !direct.is_empty() {
            return Err(EngineError::HasChildren {
                node_id: node_id.to_string(),
                children: direct,
            });
        }

        // Pre-order walk, then reversed: every child precedes its parent.
        let mut order = Vec::new();
        let mut stack = vec![node_id.to_string()];
        while let Some(id) = stack.pop() {
            stack.extend(self.children(&id).into_iter().rev());
            order.push(id);
        }
        order.reverse();
        Ok(order)
    }

    /// Drop nodes by id. Unknown ids are ignored.
    pub fn remove(&mut self, node_ids: &[String]) {
        for id in node_ids {
            if let Some(node) = self.nodes.remove(id) {
                if let Some(parent_id) = &node.parent_id {
                    if let Some(siblings) = self.children.get_mut(parent_id) {
                        siblings.remove(id);
                        if siblings.is_empty() {
                            self.children.remove(parent_id);
                        }
                    }
                }
            }
            self.children.remove(id);
        }
    }
}
