//! Effective configuration resolution
//!
//! The effective configuration of a node is the left fold of the current
//! fragments along its ancestry, root first. It is derived, never stored;
//! the cache only remembers results keyed by the exact versions they were
//! computed from.

pub mod cache;

use std::sync::Arc;

use serde::Serialize;
use tiercfg_merge::{disabled_flags, flag, KeyPath, MergeEngine, Permission, PermissionGate, Value};
use tiercfg_protocol::ops::{
    Contribution, ExplainResponse, GetEffectiveConfigResponse, VersionEntry,
};

pub use cache::{CacheStats, EffectiveCache};

use crate::error::Result;
use crate::store::ConfigRecord;

/// Placeholder substituted for secret-looking scalars.
pub const REDACTED: &str = "[REDACTED]";

/// Words that mark a value as secret when they end a key
/// (`access_token`, `sshPrivateKey`). Matching is by whole words, so
/// `max_tokens` and `token_budget` stay visible.
const SECRET_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "private_key",
    "api_key",
    "credential",
    "credentials",
];

/// `(node_id, version)` for each node on the path, root first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VersionVector(Vec<(String, u64)>);

impl VersionVector {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        Self(pairs.into_iter().collect())
    }

    pub fn from_records(chain: &[ConfigRecord]) -> Self {
        Self::from_pairs(chain.iter().map(|r| (r.node_id.clone(), r.version)))
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.0.iter().any(|(id, _)| id == node_id)
    }

    pub fn version_of(&self, node_id: &str) -> Option<u64> {
        self.0
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, version)| *version)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(id, version)| (id.as_str(), *version))
    }

    pub fn to_entries(&self) -> Vec<VersionEntry> {
        self.iter()
            .map(|(node_id, version)| VersionEntry {
                node_id: node_id.to_string(),
                version,
            })
            .collect()
    }
}

/// Merged document for one node plus the versions it was built from.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub node_id: String,
    pub versions: VersionVector,
    document: Arc<Value>,
}

impl EffectiveConfig {
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        self.document.get_path(path)
    }

    pub fn flag(&self, path: &KeyPath) -> Option<bool> {
        flag(&self.document, path)
    }

    pub fn disabled_flags(&self, set_path: &KeyPath) -> Vec<String> {
        disabled_flags(&self.document, set_path)
    }

    pub fn permission(&self, gate: &PermissionGate) -> Permission {
        gate.evaluate(&self.document)
    }

    /// Both the coarse and the fine flag must allow the capability.
    pub fn is_permitted(&self, gate: &PermissionGate) -> bool {
        self.permission(gate).allowed
    }

    /// Copy of the document with secret-looking scalars masked, plus the
    /// masked paths.
    pub fn redacted(&self) -> (Value, Vec<String>) {
        let mut document = (*self.document).clone();
        let mut redactions = Vec::new();
        redact_recursive(&mut document, String::new(), &mut redactions);
        (document, redactions)
    }

    pub fn to_response(&self, redact: bool) -> GetEffectiveConfigResponse {
        let (config, redactions) = if redact {
            let (document, redactions) = self.redacted();
            (document.to_json(), redactions)
        } else {
            (self.document.to_json(), Vec::new())
        };
        GetEffectiveConfigResponse {
            node_id: self.node_id.clone(),
            config,
            versions: self.versions.to_entries(),
            redactions,
        }
    }
}

/// Lowercased words of a key, split on `_`, `-`, `.` and camelCase humps.
fn key_words(key: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut prev_lower = false;
    for ch in key.chars() {
        if matches!(ch, '_' | '-' | '.' | ' ') {
            if !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        word.extend(ch.to_lowercase());
    }
    if !word.is_empty() {
        words.push(word);
    }
    words
}

fn is_secret_key(key: &str) -> bool {
    let words = key_words(key);
    SECRET_KEYS.iter().any(|secret| {
        let needle: Vec<&str> = secret.split('_').collect();
        words.len() >= needle.len()
            && words[words.len() - needle.len()..]
                .iter()
                .zip(&needle)
                .all(|(w, n)| w == n)
    })
}

fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
    match value {
        Value::Mapping(map) => {
            for (key, val) in map.iter_mut() {
                let current_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };

                if is_secret_key(key) && val.is_scalar() && !val.is_null() {
                    *val = Value::from(REDACTED);
                    redactions.push(current_path);
                } else {
                    redact_recursive(val, current_path, redactions);
                }
            }
        }
        Value::Sequence(items) => {
            for (i, val) in items.iter_mut().enumerate() {
                redact_recursive(val, format!("{}[{}]", path, i), redactions);
            }
        }
        Value::Scalar(_) => {}
    }
}

/// Which fragments along the ancestry touched one key path.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub node_id: String,
    pub path: KeyPath,
    /// Resolved value, `None` when the path is absent from the result
    pub value: Option<Value>,
    /// `(node_id, version, value)` root first
    pub contributions: Vec<(String, u64, Value)>,
}

impl Explanation {
    /// Last contributor along the path: the one whose value (or clearing
    /// `null`) took effect.
    pub fn decided_by(&self) -> Option<&str> {
        self.contributions.last().map(|(id, _, _)| id.as_str())
    }

    pub fn to_response(&self) -> ExplainResponse {
        ExplainResponse {
            node_id: self.node_id.clone(),
            path: self.path.to_string(),
            value: self.value.as_ref().map(Value::to_json),
            contributions: self
                .contributions
                .iter()
                .map(|(node_id, version, value)| Contribution {
                    node_id: node_id.clone(),
                    version: *version,
                    value: value.to_json(),
                })
                .collect(),
            decided_by: self.decided_by().map(str::to_string),
        }
    }
}

/// What a fragment says about `path`: the value at the path, or a non-mapping
/// value set at a prefix that displaces the whole subtree.
fn touching<'a>(fragment: &'a Value, path: &KeyPath) -> Option<&'a Value> {
    let mut current = fragment;
    for segment in path.segments() {
        match current {
            Value::Mapping(map) => current = map.get(segment)?,
            _ => return Some(current),
        }
    }
    Some(current)
}

/// Merges ancestry chains, memoizing by version vector.
#[derive(Debug)]
pub struct Resolver {
    merge: MergeEngine,
    cache: EffectiveCache,
}

impl Resolver {
    pub fn new(merge: MergeEngine, cache_capacity: usize) -> Self {
        Self {
            merge,
            cache: EffectiveCache::new(cache_capacity),
        }
    }

    pub fn merge_engine(&self) -> &MergeEngine {
        &self.merge
    }

    pub fn cache(&self) -> &EffectiveCache {
        &self.cache
    }

    /// Resolve `node_id` from its root-first chain of current records.
    pub fn resolve(&self, node_id: &str, chain: &[ConfigRecord]) -> Result<EffectiveConfig> {
        let versions = VersionVector::from_records(chain);
        if let Some(document) = self.cache.get(node_id, &versions) {
            tracing::trace!(node_id, "effective config cache hit");
            return Ok(EffectiveConfig {
                node_id: node_id.to_string(),
                versions,
                document,
            });
        }

        let document = Arc::new(
            self.merge
                .merge_all(chain.iter().map(|record| record.fragment.clone()))?,
        );
        self.cache
            .insert(node_id, versions.clone(), Arc::clone(&document));
        Ok(EffectiveConfig {
            node_id: node_id.to_string(),
            versions,
            document,
        })
    }

    pub fn explain(
        &self,
        node_id: &str,
        chain: &[ConfigRecord],
        path: &KeyPath,
    ) -> Result<Explanation> {
        let effective = self.resolve(node_id, chain)?;
        let contributions = chain
            .iter()
            .filter_map(|record| {
                touching(&record.fragment, path)
                    .map(|value| (record.node_id.clone(), record.version, value.clone()))
            })
            .collect();
        Ok(Explanation {
            node_id: node_id.to_string(),
            path: path.clone(),
            value: effective.get(path).cloned(),
            contributions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(node_id: &str, version: u64, fragment: serde_json::Value) -> ConfigRecord {
        ConfigRecord {
            version,
            fragment: Value::from_json(fragment).unwrap(),
            ..ConfigRecord::empty(node_id)
        }
    }

    fn chain() -> Vec<ConfigRecord> {
        vec![
            record("acme", 2, json!({"tools": {"web_search": true, "shell": true}})),
            record("eng", 1, json!({"tools": {"shell": false}})),
            record("platform", 0, json!({})),
        ]
    }

    #[test]
    fn test_resolve_merges_root_first() {
        let resolver = Resolver::new(MergeEngine::default(), 16);
        let effective = resolver.resolve("platform", &chain()).unwrap();
        assert_eq!(
            effective.document().to_json(),
            json!({"tools": {"web_search": true, "shell": false}})
        );
        assert_eq!(effective.versions.version_of("acme"), Some(2));
        assert_eq!(
            effective.disabled_flags(&KeyPath::parse("tools")),
            vec!["shell"]
        );
    }

    #[test]
    fn test_second_resolve_is_cached() {
        let resolver = Resolver::new(MergeEngine::default(), 16);
        resolver.resolve("platform", &chain()).unwrap();
        resolver.resolve("platform", &chain()).unwrap();
        assert_eq!(resolver.cache().stats().hits, 1);

        let mut changed = chain();
        changed[0] = record("acme", 3, json!({"tools": {"web_search": false}}));
        let effective = resolver.resolve("platform", &changed).unwrap();
        assert_eq!(effective.flag(&KeyPath::parse("tools.web_search")), Some(false));
        assert_eq!(resolver.cache().stats().hits, 1);
    }

    #[test]
    fn test_permission_gate() {
        let resolver = Resolver::new(MergeEngine::default(), 16);
        let effective = resolver
            .resolve(
                "eng",
                &[
                    record("acme", 1, json!({"tools": {"web_search": false}})),
                    record(
                        "eng",
                        1,
                        json!({"agents": {"planner": {"tools": {"web_search": true}}}}),
                    ),
                ],
            )
            .unwrap();
        let gate = PermissionGate::new(
            KeyPath::parse("tools.web_search"),
            KeyPath::parse("agents.planner.tools.web_search"),
        );
        assert!(!effective.is_permitted(&gate));
    }

    #[test]
    fn test_redaction() {
        let resolver = Resolver::new(MergeEngine::default(), 0);
        let effective = resolver
            .resolve(
                "acme",
                &[record(
                    "acme",
                    1,
                    json!({
                        "integrations": {"slack": {"api_token": "xoxb", "channel": "#ops"}},
                        "db": {"Password": "hunter2", "password_hint": null},
                        "keys": [{"private_key": "pem"}]
                    }),
                )],
            )
            .unwrap();

        let (document, redactions) = effective.redacted();
        let json = document.to_json();
        assert_eq!(json["integrations"]["slack"]["api_token"], REDACTED);
        assert_eq!(json["integrations"]["slack"]["channel"], "#ops");
        assert_eq!(json["db"]["Password"], REDACTED);
        assert!(json["db"]["password_hint"].is_null());
        assert_eq!(json["keys"][0]["private_key"], REDACTED);
        assert_eq!(
            redactions,
            vec!["db.Password", "integrations.slack.api_token", "keys[0].private_key"]
        );

        let response = effective.to_response(false);
        assert_eq!(response.config["db"]["Password"], "hunter2");
        assert!(response.redactions.is_empty());
    }

    #[test]
    fn test_redaction_matches_whole_key_words() {
        for key in ["password", "access_token", "GITHUB_TOKEN", "sshPrivateKey", "api-key", "db_credentials"] {
            assert!(is_secret_key(key), "{key} should be secret");
        }
        for key in ["max_tokens", "token_budget", "maxTokens", "keyboard", "secretary", "password_hint"] {
            assert!(!is_secret_key(key), "{key} should stay visible");
        }

        let resolver = Resolver::new(MergeEngine::default(), 0);
        let effective = resolver
            .resolve(
                "acme",
                &[record(
                    "acme",
                    1,
                    json!({"agents": {"planner": {"max_tokens": 4096, "auth_token": "t"}}}),
                )],
            )
            .unwrap();
        let (document, redactions) = effective.redacted();
        assert_eq!(document.to_json()["agents"]["planner"]["max_tokens"], 4096);
        assert_eq!(redactions, vec!["agents.planner.auth_token"]);
    }

    #[test]
    fn test_explain_contributions() {
        let resolver = Resolver::new(MergeEngine::default(), 16);
        let explanation = resolver
            .explain("platform", &chain(), &KeyPath::parse("tools.shell"))
            .unwrap();

        assert_eq!(explanation.value, Some(Value::from(false)));
        let ids: Vec<&str> = explanation
            .contributions
            .iter()
            .map(|(id, _, _)| id.as_str())
            .collect();
        assert_eq!(ids, vec!["acme", "eng"]);
        assert_eq!(explanation.decided_by(), Some("eng"));
    }

    #[test]
    fn test_explain_prefix_cleared() {
        let resolver = Resolver::new(MergeEngine::default(), 16);
        let explanation = resolver
            .explain(
                "eng",
                &[
                    record("acme", 1, json!({"mcp_servers": {"a": {"url": "x"}}})),
                    record("eng", 1, json!({"mcp_servers": {"a": null}})),
                ],
                &KeyPath::parse("mcp_servers.a.url"),
            )
            .unwrap();

        assert_eq!(explanation.value, None);
        assert_eq!(explanation.decided_by(), Some("eng"));
        assert!(explanation.contributions[1].2.is_null());
    }
}
