//! Fragment merge logic
//!
//! Combines fragments pairwise, left to right (root first, target last):
//! - Mappings: deep-merge by key
//! - Keyed collections: merge by entry id, entries deep-merged
//! - Sequences: REPLACE (last wins)
//! - Scalars: override (last wins)
//! - Explicit null: clears whatever was inherited, except flag sets and
//!   the mappings holding them
//!
//! Mixing a container with a different non-null kind is a schema violation;
//! nothing is coerced.

use crate::error::{SchemaViolation, ViolationReason};
use crate::path::KeyPath;
use crate::schema::Schema;
use crate::value::{Mapping, Value};

/// Merge engine bound to a schema.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    schema: Schema,
}

impl MergeEngine {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Merge `overlay` onto `base`.
    pub fn merge(&self, base: Value, overlay: Value) -> Result<Value, SchemaViolation> {
        let mut path = KeyPath::root();
        self.merge_at(&mut path, base, overlay)
    }

    /// Validate and merge fragments in order (first is the root, last has
    /// highest precedence). An empty input yields an empty mapping.
    pub fn merge_all<I>(&self, fragments: I) -> Result<Value, SchemaViolation>
    where
        I: IntoIterator<Item = Value>,
    {
        fragments
            .into_iter()
            .try_fold(Value::empty(), |merged, fragment| {
                self.schema.validate(&fragment)?;
                self.merge(merged, fragment)
            })
    }

    fn merge_at(
        &self,
        path: &mut KeyPath,
        base: Value,
        overlay: Value,
    ) -> Result<Value, SchemaViolation> {
        match (base, overlay) {
            (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
                if self.schema.is_keyed_collection(path) {
                    self.merge_keyed(path, base_map, overlay_map)
                } else {
                    self.merge_mappings(path, base_map, overlay_map)
                }
            }

            // Sequences: REPLACE (no concatenation, no dedup)
            (Value::Sequence(_), overlay @ Value::Sequence(_)) => Ok(overlay),

            // Scalar on the left: overlay wins whatever it is
            (Value::Scalar(_), overlay) => Ok(overlay),

            // Flags only come back by being restated as true
            (Value::Mapping(_), overlay)
                if overlay.is_null() && self.schema.guards_flag_set(path) =>
            {
                Err(SchemaViolation::new(path.clone(), ViolationReason::ClearsFlags))
            }

            // Explicit null clears an inherited container
            (_, overlay) if overlay.is_null() => Ok(overlay),

            (base, overlay) => Err(SchemaViolation::new(
                path.clone(),
                ViolationReason::Conflict {
                    left: base.kind(),
                    right: overlay.kind(),
                },
            )),
        }
    }

    fn merge_mappings(
        &self,
        path: &mut KeyPath,
        mut base: Mapping,
        overlay: Mapping,
    ) -> Result<Value, SchemaViolation> {
        for (key, overlay_value) in overlay {
            path.push(key.as_str());
            let merged = match base.remove(&key) {
                Some(base_value) => self.merge_at(path, base_value, overlay_value)?,
                None => overlay_value,
            };
            path.pop();
            base.insert(key, merged);
        }
        Ok(Value::Mapping(base))
    }

    /// Entries present on one side are carried through untouched; entries on
    /// both sides have their objects deep-merged rather than replaced.
    fn merge_keyed(
        &self,
        path: &mut KeyPath,
        mut base: Mapping,
        overlay: Mapping,
    ) -> Result<Value, SchemaViolation> {
        for (id, entry) in overlay {
            path.push(id.as_str());
            let merged = match base.remove(&id) {
                None => entry,
                Some(existing) => match (existing, entry) {
                    (Value::Mapping(existing), Value::Mapping(entry)) => {
                        self.merge_mappings(path, existing, entry)?
                    }
                    (_, entry) if entry.is_null() => entry,
                    (existing, entry) if existing.is_scalar() => entry,
                    (existing, entry) => {
                        return Err(SchemaViolation::new(
                            path.clone(),
                            ViolationReason::Conflict {
                                left: existing.kind(),
                                right: entry.kind(),
                            },
                        ))
                    }
                },
            };
            path.pop();
            base.insert(id, merged);
        }
        Ok(Value::Mapping(base))
    }
}

/// Merge two fragments under the default schema.
pub fn merge(base: Value, overlay: Value) -> Result<Value, SchemaViolation> {
    MergeEngine::default().merge(base, overlay)
}

/// Merge fragments root-to-leaf under the default schema.
pub fn merge_all<I>(fragments: I) -> Result<Value, SchemaViolation>
where
    I: IntoIterator<Item = Value>,
{
    MergeEngine::default().merge_all(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;
    use serde_json::json;

    fn value(json: serde_json::Value) -> Value {
        Value::from_json(json).unwrap()
    }

    fn merged(fragments: Vec<serde_json::Value>) -> serde_json::Value {
        merge_all(fragments.into_iter().map(value)).unwrap().to_json()
    }

    #[test]
    fn test_scalar_override() {
        let result = merged(vec![json!({"timeout": 100}), json!({"timeout": 200})]);
        assert_eq!(result["timeout"], 200);
    }

    #[test]
    fn test_mapping_deep_merge() {
        let result = merged(vec![
            json!({"model": {"name": "base", "temperature": 0}}),
            json!({"model": {"name": "team"}}),
        ]);
        assert_eq!(result["model"]["name"], "team");
        assert_eq!(result["model"]["temperature"], 0);
    }

    #[test]
    fn test_sequence_replaced_not_concatenated() {
        let result = merged(vec![json!({"dest": ["slack"]}), json!({"dest": ["github"]})]);
        assert_eq!(result["dest"], json!(["github"]));
    }

    #[test]
    fn test_cumulative_restriction() {
        let result = merged(vec![json!({}), json!({"tools": {"x": false}}), json!({})]);
        assert_eq!(result["tools"]["x"], false);
    }

    #[test]
    fn test_explicit_override_escape_hatch() {
        let result = merged(vec![
            json!({}),
            json!({"tools": {"x": false}}),
            json!({"tools": {"x": true}}),
        ]);
        assert_eq!(result["tools"]["x"], true);
    }

    #[test]
    fn test_empty_flag_set_inherits_restrictions() {
        let result = merged(vec![json!({"tools": {"x": false, "y": true}}), json!({"tools": {}})]);
        assert_eq!(result["tools"], json!({"x": false, "y": true}));
    }

    #[test]
    fn test_keyed_collection_additive() {
        let result = merged(vec![
            json!({"mcp_servers": {"a": {"url": "https://a.invalid"}}}),
            json!({"mcp_servers": {"b": {"url": "https://b.invalid"}}}),
        ]);
        let servers = result["mcp_servers"].as_object().unwrap();
        assert!(servers.contains_key("a"));
        assert!(servers.contains_key("b"));
    }

    #[test]
    fn test_keyed_collection_entries_deep_merged() {
        let result = merged(vec![
            json!({"integrations": {"slack": {"channel": "#ops", "enabled": true}}}),
            json!({"integrations": {"slack": {"channel": "#team"}}}),
        ]);
        assert_eq!(
            result["integrations"]["slack"],
            json!({"channel": "#team", "enabled": true})
        );
    }

    #[test]
    fn test_null_clears_inherited_value() {
        let result = merged(vec![
            json!({"mcp_servers": {"a": {"url": "x"}, "b": {"url": "y"}}}),
            json!({"mcp_servers": {"a": null}}),
        ]);
        assert!(result["mcp_servers"]["a"].is_null());
        assert_eq!(result["mcp_servers"]["b"]["url"], "y");
    }

    #[test]
    fn test_null_cannot_lift_inherited_flags() {
        let base = value(json!({
            "tools": {"x": false},
            "agents": {"planner": {"tools": {"web_search": false}}}
        }));
        for (overlay, at) in [
            (json!({"tools": null}), "tools"),
            (json!({"agents": {"planner": null}}), "agents.planner"),
        ] {
            let err = merge(base.clone(), value(overlay)).unwrap_err();
            assert_eq!(err.reason, ViolationReason::ClearsFlags);
            assert_eq!(err.path.to_string(), at);
        }
    }

    #[test]
    fn test_mapping_sequence_conflict_reports_path() {
        let err = merge(
            value(json!({"agents": {"planner": {"model": {"name": "m"}}}})),
            value(json!({"agents": {"planner": {"model": ["m"]}}})),
        )
        .unwrap_err();
        assert_eq!(err.path.to_string(), "agents.planner.model");
        assert_eq!(
            err.reason,
            ViolationReason::Conflict {
                left: ValueKind::Mapping,
                right: ValueKind::Sequence
            }
        );
    }

    #[test]
    fn test_container_replaced_by_scalar_is_conflict() {
        let err = merge(value(json!({"dest": ["a"]})), value(json!({"dest": "a"}))).unwrap_err();
        assert_eq!(err.path.to_string(), "dest");
    }

    #[test]
    fn test_scalar_replaced_by_container() {
        let result = merged(vec![json!({"model": "m"}), json!({"model": {"name": "m"}})]);
        assert_eq!(result["model"]["name"], "m");
    }

    #[test]
    fn test_merge_all_validates_each_fragment() {
        let err = merge_all(vec![
            value(json!({})),
            value(json!({"tools": {"x": "no"}})),
        ])
        .unwrap_err();
        assert_eq!(err.path.to_string(), "tools.x");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fragment = value(json!({
            "agents": {"planner": {"tools": {"think": true}}},
            "mcp_servers": {"a": {"args": ["--x"]}},
            "dest": ["slack"],
            "retries": 2
        }));
        let result = merge(fragment.clone(), fragment.clone()).unwrap();
        assert_eq!(result, fragment);
    }

    #[test]
    fn test_merge_all_is_left_fold() {
        let a = value(json!({"a": 1, "m": {"x": 1}}));
        let b = value(json!({"b": 2, "m": {"y": 2}}));
        let c = value(json!({"a": 3, "m": {"x": 3}, "s": [1]}));

        let all = merge_all(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let stepwise = merge(merge(a, b).unwrap(), c).unwrap();
        assert_eq!(all, stepwise);
    }

    #[test]
    fn test_empty_input_is_empty_mapping() {
        assert_eq!(merge_all(Vec::new()).unwrap(), Value::empty());
    }

    #[test]
    fn test_planner_tools_end_to_end() {
        let result = merged(vec![
            json!({"agents": {"planner": {"tools": {"think": true, "web_search": true}}}}),
            json!({"agents": {"planner": {"tools": {"web_search": false}}}}),
            json!({}),
        ]);
        assert_eq!(
            result["agents"]["planner"]["tools"],
            json!({"think": true, "web_search": false})
        );
    }
}
