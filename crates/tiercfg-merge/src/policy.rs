//! Restriction flags and effective permissions.
//!
//! Flag sets merge like any other mapping, which is what makes restrictions
//! cumulative: an ancestor `false` survives until a descendant restates the
//! key as `true`. When one capability is gated at two scopes, both resolved
//! flags must be `true` for it to be permitted.

use serde::{Deserialize, Serialize};

use crate::path::KeyPath;
use crate::value::Value;

/// Resolved boolean at `path`, if the document sets one there.
pub fn flag(document: &Value, path: &KeyPath) -> Option<bool> {
    document.get_path(path).and_then(Value::as_bool)
}

/// Keys of the flag set at `set_path` that resolve to `false`, in key order.
pub fn disabled_flags(document: &Value, set_path: &KeyPath) -> Vec<String> {
    document
        .get_path(set_path)
        .and_then(Value::as_mapping)
        .map(|flags| {
            flags
                .iter()
                .filter(|(_, v)| v.as_bool() == Some(false))
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// A capability gated by a coarse scope-wide flag and a fine per-unit flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGate {
    pub coarse: KeyPath,
    pub fine: KeyPath,
    /// Value assumed for a flag no fragment sets.
    #[serde(default = "default_when_unset")]
    pub default_when_unset: bool,
}

fn default_when_unset() -> bool {
    true
}

/// Outcome of evaluating a [`PermissionGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub coarse: Option<bool>,
    pub fine: Option<bool>,
    pub allowed: bool,
}

impl PermissionGate {
    /// Gate where unset flags count as enabled.
    pub fn new(coarse: KeyPath, fine: KeyPath) -> Self {
        Self {
            coarse,
            fine,
            default_when_unset: true,
        }
    }

    /// Treat unset flags as disabled.
    pub fn deny_when_unset(mut self) -> Self {
        self.default_when_unset = false;
        self
    }

    /// A coarse `false` is never overridden by a fine `true`.
    pub fn evaluate(&self, document: &Value) -> Permission {
        let coarse = flag(document, &self.coarse);
        let fine = flag(document, &self.fine);
        let allowed = coarse.unwrap_or(self.default_when_unset)
            && fine.unwrap_or(self.default_when_unset);
        Permission {
            coarse,
            fine,
            allowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Value {
        Value::from_json(json).unwrap()
    }

    fn gate() -> PermissionGate {
        PermissionGate::new(
            KeyPath::parse("tools.web_search"),
            KeyPath::parse("agents.planner.tools.web_search"),
        )
    }

    #[test]
    fn test_both_true_allowed() {
        let document = doc(json!({
            "tools": {"web_search": true},
            "agents": {"planner": {"tools": {"web_search": true}}}
        }));
        assert!(gate().evaluate(&document).allowed);
    }

    #[test]
    fn test_coarse_false_wins_over_fine_true() {
        let document = doc(json!({
            "tools": {"web_search": false},
            "agents": {"planner": {"tools": {"web_search": true}}}
        }));
        let permission = gate().evaluate(&document);
        assert!(!permission.allowed);
        assert_eq!(permission.coarse, Some(false));
        assert_eq!(permission.fine, Some(true));
    }

    #[test]
    fn test_fine_false_denies() {
        let document = doc(json!({"agents": {"planner": {"tools": {"web_search": false}}}}));
        assert!(!gate().evaluate(&document).allowed);
    }

    #[test]
    fn test_unset_flags_follow_default() {
        let document = doc(json!({}));
        assert!(gate().evaluate(&document).allowed);
        assert!(!gate().deny_when_unset().evaluate(&document).allowed);
    }

    #[test]
    fn test_disabled_flags() {
        let document = doc(json!({"tools": {"a": false, "b": true, "c": false}}));
        assert_eq!(disabled_flags(&document, &KeyPath::parse("tools")), vec!["a", "c"]);
        assert!(disabled_flags(&document, &KeyPath::parse("missing")).is_empty());
    }
}
